//! HTTP/1.1 exchanges over a [`Transport`]
//!
//! Every exchange is a single connect, write, read, close sequence. The
//! JSON document buffer is owned by the client and reused across exchanges.

use http::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::errors::{DdiError, InstallError, TransportError};
use crate::http::headers::{HeaderFactory, ACCEPT_HAL_JSON, ACCEPT_OCTET_STREAM};
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::installer::FirmwareInstaller;

/// Largest JSON document accepted from the server
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024;

/// Status line and framing headers of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// HTTP client for controller exchanges
pub struct HttpClient<T> {
    transport: T,
    headers: HeaderFactory,
    request: String,
    document: Vec<u8>,
}

impl<T: Transport> HttpClient<T> {
    /// Create a new HTTP client
    pub fn new(transport: T, headers: HeaderFactory) -> Self {
        Self {
            transport,
            headers,
            request: String::with_capacity(512),
            document: Vec::with_capacity(MAX_DOCUMENT_SIZE),
        }
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make a GET request and parse the JSON reply
    pub async fn get<D: DeserializeOwned>(&mut self, href: &Href) -> Result<D, DdiError> {
        debug!("GET {}", href);
        let result = self.get_inner(href).await;
        self.transport.close().await;
        result
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize>(&mut self, href: &Href, body: &B) -> Result<StatusCode, DdiError> {
        debug!("POST {}", href);
        let result = self.send_inner(Method::POST, href, body).await;
        self.transport.close().await;
        result
    }

    /// Make a PUT request with a JSON body
    pub async fn put<B: Serialize>(&mut self, href: &Href, body: &B) -> Result<StatusCode, DdiError> {
        debug!("PUT {}", href);
        let result = self.send_inner(Method::PUT, href, body).await;
        self.transport.close().await;
        result
    }

    /// Download an artifact of `size` bytes straight into the installer.
    ///
    /// Failures before the installer is started are returned as transport
    /// errors; anything after that is an [`InstallError`].
    pub async fn download<I>(&mut self, href: &Href, size: u64, installer: &mut I) -> Result<u64, DdiError>
    where
        I: FirmwareInstaller + ?Sized,
    {
        debug!("GET {} ({} bytes)", href, size);
        let result = self.download_inner(href, size, installer).await;
        self.transport.close().await;
        result
    }

    async fn get_inner<D: DeserializeOwned>(&mut self, href: &Href) -> Result<D, DdiError> {
        self.transport.connect(&href.host, href.port).await?;
        self.send_request(Method::GET, href, ACCEPT_HAL_JSON, None).await?;
        let head = self.read_head().await?;
        self.read_document(&head).await?;

        if !head.status.is_success() {
            let body = String::from_utf8_lossy(&self.document).into_owned();
            error!("HTTP GET failed: {} - {}", head.status, body);
            return Err(DdiError::HttpStatus {
                status: head.status.as_u16(),
                body,
            });
        }

        let value = serde_json::from_slice(&self.document)?;
        Ok(value)
    }

    async fn send_inner<B: Serialize>(
        &mut self,
        method: Method,
        href: &Href,
        body: &B,
    ) -> Result<StatusCode, DdiError> {
        let payload = serde_json::to_vec(body)?;
        self.transport.connect(&href.host, href.port).await?;
        self.send_request(method.clone(), href, ACCEPT_HAL_JSON, Some(&payload))
            .await?;
        let head = self.read_head().await?;

        // The reply body carries nothing we act on; drain it for the log only.
        if let Err(e) = self.read_document(&head).await {
            debug!("Ignoring unreadable reply body: {}", e);
        }
        debug!(
            "{} reply {}: {}",
            method,
            head.status,
            String::from_utf8_lossy(&self.document)
        );

        if !head.status.is_success() {
            let body = String::from_utf8_lossy(&self.document).into_owned();
            error!("HTTP {} failed: {} - {}", method, head.status, body);
            return Err(DdiError::HttpStatus {
                status: head.status.as_u16(),
                body,
            });
        }
        Ok(head.status)
    }

    async fn download_inner<I>(&mut self, href: &Href, size: u64, installer: &mut I) -> Result<u64, DdiError>
    where
        I: FirmwareInstaller + ?Sized,
    {
        self.transport.connect(&href.host, href.port).await?;
        self.send_request(Method::GET, href, ACCEPT_OCTET_STREAM, None)
            .await?;
        let head = self.read_head().await?;

        if !head.status.is_success() {
            warn!("Artifact download refused: {}", head.status);
            return Err(InstallError::Refused(head.status.as_u16()).into());
        }
        if let Some(length) = head.content_length {
            if length != size {
                warn!("Server announces {} bytes, deployment says {}", length, size);
            }
        }

        installer.begin(size).await?;
        let mut body = BodyReader::new(&mut self.transport, &head);
        let written = match installer.write_stream(&mut body, size).await {
            Ok(written) => written,
            Err(e) => {
                installer.abort().await;
                return Err(e.into());
            }
        };
        debug!("{} bytes written", written);
        installer.end().await?;
        Ok(written)
    }

    async fn send_request(
        &mut self,
        method: Method,
        href: &Href,
        accept: &str,
        body: Option<&[u8]>,
    ) -> Result<(), DdiError> {
        self.request.clear();
        self.request.push_str(&format!(
            "{} {} HTTP/1.1\r\n",
            method,
            href.request_target()
        ));
        self.request.push_str(self.headers.build(&href.host, Some(accept)));
        if let Some(body) = body {
            self.request.push_str("Content-Type: application/json\r\n");
            self.request
                .push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        self.request.push_str("\r\n");

        self.transport.write_all(self.request.as_bytes()).await?;
        if let Some(body) = body {
            self.transport.write_all(body).await?;
        }
        Ok(())
    }

    async fn read_head(&mut self) -> Result<ResponseHead, DdiError> {
        // The transport hands out lines without terminators; rebuild the raw
        // head so it can be parsed in one go.
        let mut raw = Vec::with_capacity(256);
        loop {
            let line = self
                .transport
                .read_line()
                .await?
                .ok_or_else(|| DdiError::ParseError("Connection closed inside response head".to_string()))?;
            raw.extend_from_slice(line.as_bytes());
            raw.extend_from_slice(b"\r\n");
            if line.is_empty() {
                break;
            }
            if raw.len() > MAX_DOCUMENT_SIZE {
                return Err(DdiError::DocumentTooLarge(MAX_DOCUMENT_SIZE));
            }
        }

        let head = parse_head(&raw)?;
        debug!("Headers received: {:?}", head);
        Ok(head)
    }

    async fn read_document(&mut self, head: &ResponseHead) -> Result<(), DdiError> {
        self.document.clear();
        let mut body = BodyReader::new(&mut self.transport, head);
        let mut chunk = [0u8; 512];
        loop {
            let n = body.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            if self.document.len() + n > MAX_DOCUMENT_SIZE {
                return Err(DdiError::DocumentTooLarge(MAX_DOCUMENT_SIZE));
            }
            self.document.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Most headers read from one response
const MAX_HEADERS: usize = 32;

/// Parse a complete response head, blank line included
fn parse_head(raw: &[u8]) -> Result<ResponseHead, DdiError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(raw) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(DdiError::ParseError("Incomplete response head".to_string()))
        }
        Err(e) => return Err(DdiError::ParseError(format!("Bad response head: {}", e))),
    }

    let status = response
        .code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| DdiError::ParseError("Bad status code".to_string()))?;

    let mut head = ResponseHead {
        status,
        content_length: None,
        chunked: false,
    };
    for header in response.headers.iter() {
        let value = String::from_utf8_lossy(header.value);
        if header.name.eq_ignore_ascii_case("content-length") {
            head.content_length = value.trim().parse().ok();
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            head.chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }
    Ok(head)
}

#[derive(Debug)]
enum Framing {
    Length(u64),
    Chunked { remaining: u64, done: bool },
    UntilClose,
}

/// Size of the chunk announced by a chunk-size line (terminator stripped)
fn parse_chunk_size(line: &str) -> Result<u64, TransportError> {
    let mut raw = Vec::with_capacity(line.len() + 2);
    raw.extend_from_slice(line.as_bytes());
    raw.extend_from_slice(b"\r\n");
    match httparse::parse_chunk_size(&raw) {
        Ok(httparse::Status::Complete((_, size))) => Ok(size),
        _ => Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Bad chunk size: {:?}", line),
        ))),
    }
}

/// Reads a response body according to its framing
pub struct BodyReader<'a> {
    transport: &'a mut dyn Transport,
    framing: Framing,
}

impl<'a> BodyReader<'a> {
    pub fn new(transport: &'a mut dyn Transport, head: &ResponseHead) -> Self {
        let framing = if head.chunked {
            Framing::Chunked {
                remaining: 0,
                done: false,
            }
        } else if let Some(length) = head.content_length {
            Framing::Length(length)
        } else {
            Framing::UntilClose
        };
        Self { transport, framing }
    }

    /// Read body bytes; 0 once the body is complete
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        match &mut self.framing {
            Framing::UntilClose => self.transport.read(buf).await,
            Framing::Length(remaining) => {
                if *remaining == 0 {
                    return Ok(0);
                }
                let max = buf.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let n = self.transport.read(&mut buf[..max]).await?;
                *remaining -= n as u64;
                Ok(n)
            }
            Framing::Chunked { remaining, done } => {
                if *done {
                    return Ok(0);
                }
                if *remaining == 0 {
                    let size_line = self.transport.read_line().await?.unwrap_or_default();
                    let size = parse_chunk_size(&size_line)?;
                    if size == 0 {
                        *done = true;
                        while let Some(trailer) = self.transport.read_line().await? {
                            if trailer.is_empty() {
                                break;
                            }
                        }
                        return Ok(0);
                    }
                    *remaining = size;
                }
                let max = buf.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let n = self.transport.read(&mut buf[..max]).await?;
                if n == 0 {
                    return Err(TransportError::Io(std::io::ErrorKind::UnexpectedEof.into()));
                }
                *remaining -= n as u64;
                if *remaining == 0 {
                    self.transport.read_line().await?;
                }
                Ok(n)
            }
        }
    }
}
