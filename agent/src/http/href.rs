//! Resolution of server-supplied resource references

use std::fmt;

/// Port used when a reference carries no numeric port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Connection parameters for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Href {
    /// Server host name, empty when the reference could not be resolved
    pub host: String,

    /// Server port
    pub port: u16,

    /// Resource path without the leading slash
    pub path: String,
}

impl Href {
    /// Build an href for a path on a known server
    pub fn new(host: impl Into<String>, port: u16, path: impl AsRef<str>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.as_ref().trim_start_matches('/').to_string(),
        }
    }

    /// Parse `scheme://host[:port]/path...` into host, port and path.
    ///
    /// The token after the host is taken as the port only if it is numeric;
    /// otherwise it starts the path and the port falls back to 443. Anything
    /// without a `scheme://` prefix, or without a host, resolves to an href
    /// with an empty host which callers must skip.
    pub fn resolve(reference: &str) -> Self {
        let reference = reference.trim();
        let Some((_scheme, rest)) = reference.split_once("://") else {
            return Self {
                path: reference.trim_start_matches('/').to_string(),
                ..Default::default()
            };
        };

        let rest = rest.trim_start_matches('/');
        let host_end = rest.find([':', '/']).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            return Self::default();
        }

        let rest = rest[host_end..].trim_start_matches([':', '/']);
        let (token, remainder) = match rest.split_once('/') {
            Some((token, remainder)) => (token, remainder.trim_start_matches('/')),
            None => (rest, ""),
        };

        let (port, path) = match token.parse::<u16>() {
            Ok(port) => (port, remainder.to_string()),
            Err(_) if remainder.is_empty() => (DEFAULT_HTTPS_PORT, token.to_string()),
            Err(_) => (DEFAULT_HTTPS_PORT, format!("{}/{}", token, remainder)),
        };

        Self {
            host: host.to_string(),
            port,
            path,
        }
    }

    /// True when there is no host to connect to
    pub fn is_unresolved(&self) -> bool {
        self.host.is_empty()
    }

    /// The request target used on the request line
    pub fn request_target(&self) -> String {
        format!("/{}", self.path)
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.path)
    }
}
