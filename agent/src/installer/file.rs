//! Installer that writes the image to a file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::errors::InstallError;
use crate::installer::FirmwareInstaller;
use crate::utils::hex;

/// Writes the image to `<target>.part` and renames it into place on success
pub struct FileInstaller {
    target: PathBuf,
    file: Option<fs::File>,
    hasher: Sha256,
    expected: u64,
    written: u64,
    finished: bool,
    last_error: Option<InstallError>,
}

impl FileInstaller {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            file: None,
            hasher: Sha256::new(),
            expected: 0,
            written: 0,
            finished: false,
            last_error: None,
        }
    }

    /// Final location of the image
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// `<target>.part`, where the image is written until it is complete
    pub fn part_path(&self) -> PathBuf {
        let mut name = self.target.clone().into_os_string();
        name.push(".part");
        PathBuf::from(name)
    }

    async fn discard_part(&mut self) {
        self.file = None;
        if let Err(e) = fs::remove_file(self.part_path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Unable to remove {}: {}", self.part_path().display(), e);
            }
        }
    }

    async fn fail(&mut self, err: InstallError) -> InstallError {
        error!("Firmware install failed: {}", err);
        self.discard_part().await;
        self.last_error = Some(err.clone());
        err
    }

    fn io_error(code: i32, e: std::io::Error) -> InstallError {
        InstallError::Device {
            code,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl FirmwareInstaller for FileInstaller {
    async fn begin(&mut self, total_size: u64) -> Result<(), InstallError> {
        self.hasher = Sha256::new();
        self.expected = total_size;
        self.written = 0;
        self.finished = false;
        self.last_error = None;

        if let Some(parent) = self.target.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return Err(self.fail(Self::io_error(10, e)).await);
            }
        }
        match fs::File::create(self.part_path()).await {
            Ok(file) => {
                self.file = Some(file);
                Ok(())
            }
            Err(e) => Err(self.fail(Self::io_error(11, e)).await),
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<usize, InstallError> {
        let Some(file) = self.file.as_mut() else {
            return Err(self.fail(InstallError::NotStarted).await);
        };
        if let Err(e) = file.write_all(chunk).await {
            return Err(self.fail(Self::io_error(12, e)).await);
        }
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;
        Ok(chunk.len())
    }

    async fn end(&mut self) -> Result<(), InstallError> {
        let Some(mut file) = self.file.take() else {
            return Err(self.fail(InstallError::NotStarted).await);
        };
        if self.written != self.expected {
            drop(file);
            let err = InstallError::SizeMismatch {
                expected: self.expected,
                written: self.written,
            };
            return Err(self.fail(err).await);
        }
        if let Err(e) = file.sync_all().await {
            drop(file);
            return Err(self.fail(Self::io_error(13, e)).await);
        }
        drop(file);

        if let Err(e) = fs::rename(self.part_path(), &self.target).await {
            return Err(self.fail(Self::io_error(14, e)).await);
        }

        let digest = std::mem::replace(&mut self.hasher, Sha256::new()).finalize();
        info!(
            "Image written to {} ({} bytes, sha256 {})",
            self.target.display(),
            self.written,
            hex::encode(digest)
        );
        self.finished = true;
        Ok(())
    }

    async fn abort(&mut self) {
        info!("Discarding partial image {}", self.part_path().display());
        self.discard_part().await;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn last_error(&self) -> Option<&InstallError> {
        self.last_error.as_ref()
    }
}
