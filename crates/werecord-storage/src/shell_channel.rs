use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};
use werecord_core::channel::{FileChannel, ShellFailure};

/// File channel that runs commands through a privileged shell (`su -c`).
#[derive(Debug, Clone)]
pub struct SuFileChannel {
    program: String,
}

impl Default for SuFileChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SuFileChannel {
    pub fn new() -> Self {
        Self::with_program("su")
    }

    /// Use another shell binary that accepts `-c <command>`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, script: &str) -> Result<Vec<u8>, ShellFailure> {
        let output = Command::new(&self.program)
            .arg("-c")
            .arg(script)
            .output()
            .await
            .map_err(|e| ShellFailure::Unavailable {
                reason: format!("{}: {e}", self.program),
            })?;

        if !output.status.success() {
            return Err(ShellFailure::CommandFailed {
                command: script.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl FileChannel for SuFileChannel {
    #[instrument(skip_all, fields(path = %path.display()))]
    async fn exists(&self, path: &Path) -> bool {
        match self.run(&format!("test -e {}", quote(path))).await {
            Ok(_) => true,
            Err(err) => {
                debug!(%err, "treating probe failure as absent");
                false
            }
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn read_text(&self, path: &Path) -> Result<String, ShellFailure> {
        let stdout = self.run(&format!("cat {}", quote(path))).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    #[instrument(skip_all, fields(src = %src.display(), dst = %dst.display()))]
    async fn copy(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), ShellFailure> {
        let (src, dst) = (quote(src), quote(dst));
        // Copies land owned by root; open them up so this process can read them.
        let copy = format!("cp -f {src} {dst} && chmod 666 {dst}");
        let script = if overwrite {
            copy
        } else {
            format!("[ -e {dst} ] || {{ {copy}; }}")
        };
        self.run(&script).await.map(|_| ())
    }
}

/// Single-quote a path for `sh`.
fn quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}
