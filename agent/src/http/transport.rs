//! Byte-stream transport used for every exchange

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// A connect / write / read / close byte stream.
///
/// Each exchange opens a fresh connection and closes it again; the client
/// never keeps a connection across exchanges.
#[async_trait]
pub trait Transport: Send {
    /// Open a connection, dropping any previous one
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Write all bytes
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read one line without its terminator; `None` at end of stream
    async fn read_line(&mut self) -> Result<Option<String>, TransportError>;

    /// Read up to `buf.len()` bytes; 0 at end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Close the connection
    async fn close(&mut self);
}

/// Transport timeouts
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Time allowed to establish the connection (including TLS handshake)
    pub connect: Duration,

    /// Time allowed for each individual read or write
    pub io: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            io: Duration::from_secs(30),
        }
    }
}

trait Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> Stream for T {}

/// TCP transport with optional TLS
pub struct TcpTransport {
    tls: Option<TlsConnector>,
    timeouts: Timeouts,
    stream: Option<BufStream<Box<dyn Stream>>>,
}

impl TcpTransport {
    /// Plain TCP transport
    pub fn plain(timeouts: Timeouts) -> Self {
        Self {
            tls: None,
            timeouts,
            stream: None,
        }
    }

    /// TLS transport verifying the server against a PEM CA bundle, or the
    /// system certificate store when no bundle is given
    pub fn tls(ca_cert_path: Option<&str>, timeouts: Timeouts) -> Result<Self, TransportError> {
        let mut root_cert_store = RootCertStore::empty();

        if let Some(ca_path) = ca_cert_path {
            let ca_pem = std::fs::read(ca_path)
                .map_err(|e| TransportError::Tls(format!("Failed to read CA cert {ca_path}: {e}")))?;
            let mut cursor = std::io::Cursor::new(ca_pem);
            for cert in rustls_pemfile::certs(&mut cursor).flatten() {
                let _ = root_cert_store.add(cert);
            }
        } else {
            for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                let _ = root_cert_store.add(cert);
            }
        }

        if root_cert_store.is_empty() {
            return Err(TransportError::Tls("No trusted root certificates".to_string()));
        }

        let client_config = ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        Ok(Self {
            tls: Some(TlsConnector::from(Arc::new(client_config))),
            timeouts,
            stream: None,
        })
    }

    fn stream(&mut self) -> Result<&mut BufStream<Box<dyn Stream>>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Stream>, TransportError> {
        let connect_err = |reason: String| TransportError::Connect {
            host: host.to_string(),
            port,
            reason,
        };

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        let _ = tcp.set_nodelay(true);

        match &self.tls {
            None => Ok(Box::new(tcp)),
            Some(connector) => {
                let server_name = ServerName::try_from(host)
                    .map_err(|e| connect_err(e.to_string()))?
                    .to_owned();
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                Ok(Box::new(tls))
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.close().await;
        debug!("Connecting to {}:{}", host, port);
        let stream = tokio::time::timeout(self.timeouts.connect, self.open(host, port))
            .await
            .map_err(|_| TransportError::Timeout(self.timeouts.connect))??;
        self.stream = Some(BufStream::new(stream));
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let timeout = self.timeouts.io;
        let stream = self.stream()?;
        tokio::time::timeout(timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let timeout = self.timeouts.io;
        let stream = self.stream()?;
        let mut line = String::new();
        let n = tokio::time::timeout(timeout, stream.read_line(&mut line))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let timeout = self.timeouts.io;
        let stream = self.stream()?;
        let n = tokio::time::timeout(timeout, stream.read(buf))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        Ok(n)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error while closing connection: {}", e);
            }
        }
    }
}
