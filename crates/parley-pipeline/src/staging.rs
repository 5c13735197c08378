//! Staged upload spooling.
//!
//! When a stage directory is configured, the uploaded audio is written to a
//! temporary file for the duration of the run. The file is removed when the
//! guard drops, which covers success, stage failure, deadline expiry and
//! task cancellation alike.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug)]
pub struct StagedAudio {
    file: NamedTempFile,
}

impl StagedAudio {
    /// Spool `audio` into `dir` on the blocking pool. Hands the buffer back
    /// alongside the guard.
    pub async fn stage(dir: PathBuf, audio: Vec<u8>) -> std::io::Result<(Self, Vec<u8>)> {
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("parley-upload-")
                .suffix(".audio")
                .tempfile_in(&dir)?;
            file.write_all(&audio)?;
            file.flush()?;
            debug!(path = %file.path().display(), bytes = audio.len(), "Staged upload");
            Ok((Self { file }, audio))
        })
        .await
        .map_err(std::io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
