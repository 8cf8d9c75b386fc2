//! LaTeX compilation: run the engine twice over the generated `.tex`.
//!
//! Two passes are needed for cross-references. Each pass's stdout/stderr
//! goes to a timestamped compile log under the logs directory whatever the
//! outcome, and the job's `.aux`, `.log` and `.out` files are removed
//! afterwards on success and on failure alike.

use crate::error::CompileError;
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Intermediate files the engine leaves next to the output.
pub const TEMP_EXTENSIONS: [&str; 3] = ["aux", "log", "out"];

const PASSES: u8 = 2;

/// What to compile and where.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub engine: String,
    pub tex_path: PathBuf,
    /// Directory receiving `<job_name>.pdf`.
    pub output_dir: PathBuf,
    /// Output base name (`-jobname`).
    pub job_name: String,
    pub log_path: PathBuf,
    pub timeout: Duration,
}

impl CompileJob {
    pub fn pdf_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", self.job_name))
    }
}

/// Compile `job`, returning the PDF path on success.
pub async fn compile(job: &CompileJob) -> Result<PathBuf, CompileError> {
    info!("Compiling {} with {}", job.tex_path.display(), job.engine);
    let result = run_passes(job).await;
    cleanup_temp_files(&job.output_dir, &job.job_name);

    match result {
        Ok(()) => {
            info!("Compilation finished: {}", job.pdf_path().display());
            Ok(job.pdf_path())
        }
        Err(e) => {
            warn!("Compilation failed: {} (see {})", e, job.log_path.display());
            Err(e)
        }
    }
}

async fn run_passes(job: &CompileJob) -> Result<(), CompileError> {
    let mut log = CompileLog::create(&job.log_path)?;
    log.line(&format!("Compiling {}", job.tex_path.display()))?;
    log.line(&format!("Started: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S")))?;

    for pass in 1..=PASSES {
        info!("Compile pass {}/{}", pass, PASSES);
        log.line(&format!("\nPass {pass}:"))?;

        let output = match run_engine(job, pass).await {
            Ok(output) => output,
            Err(e) => {
                log.line(&format!("\nFAILED: {e}"))?;
                return Err(e);
            }
        };
        log.output(&output)?;

        if !output.status.success() {
            let code = output.status.code();
            log.line(&format!("\nFAILED: exit code {code:?}"))?;
            return Err(CompileError::PassFailed { pass, code });
        }
    }

    log.line(&format!(
        "\nFinished: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

async fn run_engine(job: &CompileJob, pass: u8) -> Result<Output, CompileError> {
    let mut cmd = Command::new(&job.engine);
    cmd.arg("-interaction=nonstopmode")
        .arg(format!("-output-directory={}", job.output_dir.display()))
        .arg(format!("-jobname={}", job.job_name))
        .arg(&job.tex_path)
        .kill_on_drop(true);

    tokio::time::timeout(job.timeout, cmd.output())
        .await
        .map_err(|_| CompileError::Timeout {
            pass,
            secs: job.timeout.as_secs(),
        })?
        .map_err(|source| CompileError::Spawn {
            engine: job.engine.clone(),
            source,
        })
}

/// Remove `<job_name>.{aux,log,out}` from `dir`. Missing files are fine.
pub fn cleanup_temp_files(dir: &Path, job_name: &str) {
    for ext in TEMP_EXTENSIONS {
        let path = dir.join(format!("{job_name}.{ext}"));
        if !path.exists() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => info!("Removed temp file {}", path.display()),
            Err(e) => warn!("Could not remove temp file {}: {}", path.display(), e),
        }
    }
}

struct CompileLog {
    path: PathBuf,
    file: std::fs::File,
}

impl CompileLog {
    fn create(path: &Path) -> Result<Self, CompileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CompileError::Log {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = std::fs::File::create(path).map_err(|source| CompileError::Log {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn line(&mut self, text: &str) -> Result<(), CompileError> {
        writeln!(self.file, "{text}").map_err(|source| CompileError::Log {
            path: self.path.clone(),
            source,
        })
    }

    fn output(&mut self, output: &Output) -> Result<(), CompileError> {
        self.line("\nSTDOUT:")?;
        self.line(&String::from_utf8_lossy(&output.stdout))?;
        self.line("\nSTDERR:")?;
        self.line(&String::from_utf8_lossy(&output.stderr))?;
        self.line(&"=".repeat(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path, engine: &str) -> CompileJob {
        CompileJob {
            engine: engine.to_string(),
            tex_path: dir.join("paper_annotated.tex"),
            output_dir: dir.to_path_buf(),
            job_name: "paper".to_string(),
            log_path: dir.join("logs").join("paper.pdf_compile.txt"),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn pdf_path_uses_job_name() {
        let j = job(Path::new("/out"), "xelatex");
        assert_eq!(j.pdf_path(), PathBuf::from("/out/paper.pdf"));
    }

    #[test]
    fn cleanup_removes_only_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["paper.aux", "paper.log", "paper.out", "paper.pdf", "other.aux"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        cleanup_temp_files(dir.path(), "paper");

        assert!(!dir.path().join("paper.aux").exists());
        assert!(!dir.path().join("paper.log").exists());
        assert!(!dir.path().join("paper.out").exists());
        assert!(dir.path().join("paper.pdf").exists());
        assert!(dir.path().join("other.aux").exists());
    }

    #[tokio::test]
    async fn missing_engine_fails_but_writes_log_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paper.aux"), "stale").unwrap();
        let j = job(dir.path(), "definitely-not-a-latex-engine-xyz");

        let err = compile(&j).await.unwrap_err();

        assert!(matches!(err, CompileError::Spawn { .. }));
        assert!(!dir.path().join("paper.aux").exists());
        let log = std::fs::read_to_string(&j.log_path).unwrap();
        assert!(log.contains("Pass 1:"));
        assert!(log.contains("FAILED"));
    }

    /// Write a shell script that behaves like a LaTeX engine: it records
    /// each invocation, then leaves a PDF and the usual auxiliary files.
    #[cfg(unix)]
    fn fake_engine(dir: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) d="${{arg#-output-directory=}}" ;;
    -jobname=*) j="${{arg#-jobname=}}" ;;
  esac
done
echo pass >> "{passes}"
touch "$d/$j.pdf" "$d/$j.aux" "$d/$j.log" "$d/$j.out"
exit {exit_code}
"#,
            passes = dir.join("passes.txt").display(),
        );
        let path = dir.join("fake-xelatex.sh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_engine_runs_two_passes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), 0);
        let j = job(dir.path(), engine.to_str().unwrap());

        let pdf = compile(&j).await.unwrap();

        assert_eq!(pdf, dir.path().join("paper.pdf"));
        assert!(pdf.exists());
        let passes = std::fs::read_to_string(dir.path().join("passes.txt")).unwrap();
        assert_eq!(passes.lines().count(), 2);
        for ext in ["aux", "log", "out"] {
            assert!(!dir.path().join(format!("paper.{ext}")).exists());
        }
        let log = std::fs::read_to_string(&j.log_path).unwrap();
        assert!(log.contains("Pass 2:"));
        assert!(log.contains("Finished:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_stops_after_first_pass() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), 1);
        let j = job(dir.path(), engine.to_str().unwrap());

        let err = compile(&j).await.unwrap_err();

        assert!(matches!(
            err,
            CompileError::PassFailed { pass: 1, code: Some(1) }
        ));
        let passes = std::fs::read_to_string(dir.path().join("passes.txt")).unwrap();
        assert_eq!(passes.lines().count(), 1);
        assert!(!dir.path().join("paper.aux").exists());
    }
}
