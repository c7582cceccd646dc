//! Parsed destination URLs.

use std::fmt;

use url::Url;

/// Where a virtual host's traffic goes: scheme, host[:port], base path and
/// base query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    url: Url,
}

impl Destination {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(|url| Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// `host[:port]` as configured, or `None` when the URL has no host.
    ///
    /// The port is only present when it was explicit and not the scheme
    /// default.
    pub fn authority(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// `host:port` suitable for dialing, filling in the scheme's default port.
    pub fn socket_target(&self) -> Option<String> {
        let host = self.url.host_str()?;
        let port = self.url.port_or_known_default()?;
        Some(format!("{host}:{port}"))
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Base query, empty when absent.
    pub fn query(&self) -> &str {
        self.url.query().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
