//! Firmware installation
//!
//! The installer is the collaborator that actually writes an image to the
//! device. The protocol core only drives it through [`FirmwareInstaller`].

pub mod file;

use async_trait::async_trait;

use crate::errors::InstallError;
use crate::http::client::BodyReader;

/// Size of the buffer used to move image bytes from the transport
pub const STREAM_BUFFER_SIZE: usize = 4096;

/// Writes a firmware image to the device
#[async_trait]
pub trait FirmwareInstaller: Send {
    /// Prepare for an image of `total_size` bytes
    async fn begin(&mut self, total_size: u64) -> Result<(), InstallError>;

    /// Write the next part of the image, returning the bytes accepted
    async fn write(&mut self, chunk: &[u8]) -> Result<usize, InstallError>;

    /// Finalize the image
    async fn end(&mut self) -> Result<(), InstallError>;

    /// Discard a partially written image after the download broke off
    async fn abort(&mut self) {}

    /// True once a complete image was finalized
    fn is_finished(&self) -> bool;

    /// The last error reported, if any
    fn last_error(&self) -> Option<&InstallError>;

    /// Copy `length` bytes from the response body into the installer
    async fn write_stream(&mut self, body: &mut BodyReader<'_>, length: u64) -> Result<u64, InstallError> {
        let mut buf = vec![0u8; STREAM_BUFFER_SIZE];
        let mut written = 0u64;
        while written < length {
            let max = buf
                .len()
                .min(usize::try_from(length - written).unwrap_or(usize::MAX));
            let n = body
                .read(&mut buf[..max])
                .await
                .map_err(|e| InstallError::Stream {
                    written,
                    reason: e.to_string(),
                })?;
            if n == 0 {
                break;
            }
            let mut offset = 0;
            while offset < n {
                let accepted = self.write(&buf[offset..n]).await?;
                if accepted == 0 {
                    return Err(InstallError::Stream {
                        written,
                        reason: "installer accepted no bytes".to_string(),
                    });
                }
                offset += accepted;
                written += accepted as u64;
            }
        }
        Ok(written)
    }
}
