//! Request header construction

use std::fmt::Write as _;

use secrecy::{ExposeSecret, SecretString};

use crate::ddi::identity::CredentialKind;

/// Media type requested for controller resources
pub const ACCEPT_HAL_JSON: &str = "application/hal+json";

/// Media type requested for artifact downloads
pub const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

/// Builds the header block sent with every request.
///
/// The block is rebuilt into the same buffer on every call.
#[derive(Debug)]
pub struct HeaderFactory {
    kind: CredentialKind,
    token: SecretString,
    block: String,
}

impl HeaderFactory {
    pub fn new(kind: CredentialKind, token: SecretString) -> Self {
        Self {
            kind,
            token,
            block: String::with_capacity(256),
        }
    }

    /// Build `Host`, optional `Authorization`, optional `Accept` and
    /// `Connection: close`, each terminated by CRLF.
    pub fn build(&mut self, host: &str, accept: Option<&str>) -> &str {
        self.block.clear();
        let _ = write!(self.block, "Host: {}\r\n", host);
        if let Some(scheme) = self.kind.scheme() {
            let _ = write!(
                self.block,
                "Authorization: {} {}\r\n",
                scheme,
                self.token.expose_secret()
            );
        }
        if let Some(accept) = accept.filter(|a| !a.is_empty()) {
            let _ = write!(self.block, "Accept: {}\r\n", accept);
        }
        self.block.push_str("Connection: close\r\n");
        &self.block
    }
}
