use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{trace, warn};

use crate::error::{FetchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// No byte received yet; nothing exists on disk.
    Pending,
    Open,
    Closed,
}

/// Lazily materialized destination file for one transfer.
///
/// Nothing touches the filesystem until the first body byte arrives; at that
/// point missing parent directories are created and the destination is
/// truncated. A sink opens at most once and is closed exactly once, either
/// through [`Sink::close`] or [`Sink::discard`].
#[derive(Debug)]
pub struct Sink {
    path:          PathBuf,
    file:          Option<BufWriter<File>>,
    state:         SinkState,
    materialized:  bool,
    bytes_written: u64,
}

impl Sink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:          path.into(),
            file:          None,
            state:         SinkState::Pending,
            materialized:  false,
            bytes_written: 0,
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Returns `true` once the destination has been opened for writing.
    pub fn is_materialized(&self) -> bool { self.materialized }

    pub fn is_closed(&self) -> bool { self.state == SinkState::Closed }

    pub fn bytes_written(&self) -> u64 { self.bytes_written }

    /// Append a chunk, opening the destination on the first non-empty chunk.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        self.open().await?;
        let Some(file) = self.file.as_mut() else {
            return Err(self.not_open());
        };
        file.write_all(chunk)
            .await
            .map_err(|e| FetchError::sink(&self.path, e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Open the destination even if no byte was received.
    ///
    /// Used for a `200` with an empty body, which must still replace the
    /// previous contents.
    pub async fn materialize(&mut self) -> Result<()> { self.open().await }

    async fn open(&mut self) -> Result<()> {
        match self.state {
            SinkState::Closed => {
                return Err(FetchError::Sink {
                    path:    self.path.clone(),
                    message: "sink already closed".to_string(),
                });
            }
            SinkState::Pending => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| FetchError::sink(parent, e))?;
                }
                let file = File::create(&self.path)
                    .await
                    .map_err(|e| FetchError::sink(&self.path, e))?;
                trace!(path = %self.path.display(), "sink materialized");
                self.file = Some(BufWriter::new(file));
                self.state = SinkState::Open;
                self.materialized = true;
            }
            SinkState::Open => {}
        }
        Ok(())
    }

    fn not_open(&self) -> FetchError {
        FetchError::Sink {
            path:    self.path.clone(),
            message: "sink has no open file".to_string(),
        }
    }

    /// Flush and close the destination.
    ///
    /// Closing a sink that never materialized only marks it closed. The
    /// sink counts as closed even when flushing fails.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SinkState::Closed {
            return Ok(());
        }
        self.state = SinkState::Closed;

        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        file.flush().await.map_err(|e| FetchError::sink(&self.path, e))?;
        file.get_mut()
            .sync_all()
            .await
            .map_err(|e| FetchError::sink(&self.path, e))?;
        trace!(path = %self.path.display(), bytes = self.bytes_written, "sink closed");
        Ok(())
    }

    /// Close the sink and remove whatever it wrote.
    ///
    /// A sink that never materialized leaves the destination untouched.
    pub async fn discard(&mut self) -> Result<()> {
        let materialized = self.is_materialized();
        if let Err(e) = self.close().await {
            warn!(path = %self.path.display(), error = %e, "failed to close discarded sink");
        }
        if !materialized {
            return Ok(());
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                trace!(path = %self.path.display(), "partial destination removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FetchError::sink(&self.path, e)),
        }
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        if self.state == SinkState::Open {
            warn!(path = %self.path.display(), "sink dropped without being closed");
        }
    }
}
