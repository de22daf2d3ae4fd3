//! Network endpoints
//!
//! An endpoint is the network entry point of a peer: protocol, host, port
//! and, for some protocols, a resource. All parts together map one-to-one to
//! a URI of the form
//!
//! ```text
//! protocol://host[:port][/path][?query]
//! ```
//!
//! Examples:
//!
//! ```text
//! rtsp://localhost:123/path?query
//! rtp+rs8m://localhost:123
//! rtp://127.0.0.1:123
//! rtp://[::1]:123
//! ```

pub mod protocol;

pub use protocol::Protocol;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};

/// Port value meaning "protocol default" when composing and "absent" after parsing
pub const PORT_UNSPECIFIED: i32 = -1;

/// Port value asking bind to pick a free port
pub const PORT_EPHEMERAL: i32 = 0;

/// Network endpoint
///
/// Plain value type. `Receiver::bind` overwrites `port` with the port that
/// was actually bound, which matters when binding to [`PORT_EPHEMERAL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// URI scheme, must be set to compose a URI
    pub protocol: Option<Protocol>,
    /// FQDN, IPv4 address or IPv6 address in square brackets.
    /// Use "0.0.0.0" or "[::]" to bind to all interfaces.
    pub host: String,
    /// TCP or UDP port, [`PORT_EPHEMERAL`] or [`PORT_UNSPECIFIED`]
    pub port: i32,
    /// Path and query, only for protocols that support them
    pub resource: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            protocol: None,
            host: String::new(),
            port: PORT_UNSPECIFIED,
            resource: String::new(),
        }
    }
}

impl Endpoint {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: i32) -> Self {
        Self {
            protocol: Some(protocol),
            host: host.into(),
            port,
            resource: String::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Decompose a URI into an endpoint
    ///
    /// Only URIs already in canonical form are accepted, so composing the
    /// result gives back the same string.
    pub fn parse(uri: &str) -> Result<Self> {
        ensure_no_nul("uri", uri)?;

        if uri.is_empty() {
            return Err(malformed("empty uri"));
        }

        let url = Url::parse(uri).map_err(|err| malformed(&err.to_string()))?;
        if url.as_str() != uri {
            return Err(malformed(&format!("uri is not canonical, expected {:?}", url.as_str())));
        }
        if url.cannot_be_a_base() {
            return Err(malformed("missing scheme separator"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(malformed("user info is not allowed"));
        }
        if url.fragment().is_some() {
            return Err(malformed("fragment is not allowed"));
        }

        let protocol: Protocol = url.scheme().parse()?;

        let host = url.host_str().unwrap_or_default();
        if host.is_empty() {
            return Err(malformed("missing host"));
        }

        let port = match url.port() {
            Some(port) => i32::from(port),
            None if protocol.default_port().is_none() => {
                return Err(malformed(&format!(
                    "protocol {protocol} has no default port, port is required"
                )));
            }
            None => PORT_UNSPECIFIED,
        };

        let resource = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        if !resource.is_empty() {
            if !protocol.supports_resource() {
                return Err(malformed(&format!("protocol {protocol} does not allow a resource")));
            }
            validate_resource(&resource)?;
        }

        Ok(Self {
            protocol: Some(protocol),
            host: host.to_string(),
            port,
            resource,
        })
    }

    /// Compose the endpoint into a URI
    pub fn to_uri(&self) -> Result<String> {
        let protocol = self.protocol.ok_or_else(|| malformed("protocol is not set"))?;

        ensure_no_nul("host", &self.host)?;
        ensure_no_nul("resource", &self.resource)?;

        if self.host.is_empty() {
            return Err(malformed("missing host"));
        }

        let mut uri = format!("{}://{}", protocol.scheme(), self.host);

        match self.port {
            PORT_UNSPECIFIED => {
                if protocol.default_port().is_none() {
                    return Err(malformed(&format!(
                        "protocol {protocol} has no default port, port is required"
                    )));
                }
            }
            port if (0..=u16::MAX as i32).contains(&port) => {
                uri.push(':');
                uri.push_str(&port.to_string());
            }
            port => return Err(malformed(&format!("port {port} out of range"))),
        }

        if !self.resource.is_empty() {
            if !protocol.supports_resource() {
                return Err(malformed(&format!("protocol {protocol} does not allow a resource")));
            }
            uri.push_str(&self.resource);
        }

        // the composed string must parse back into exactly these fields
        if Self::parse(&uri)? != *self {
            return Err(malformed(&format!("endpoint does not compose to a canonical uri: {uri:?}")));
        }
        Ok(uri)
    }

    /// Port to use on the wire, falling back to the protocol default
    pub fn effective_port(&self) -> Option<u16> {
        match self.port {
            PORT_UNSPECIFIED => self.protocol.and_then(Protocol::default_port),
            port => u16::try_from(port).ok(),
        }
    }

    /// Host with IPv6 brackets removed, suitable for address resolution
    pub fn bare_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_uri() {
            Ok(uri) => f.write_str(&uri),
            Err(_) => write!(
                f,
                "<invalid endpoint {:?} {:?} {} {:?}>",
                self.protocol, self.host, self.port, self.resource
            ),
        }
    }
}

/// Reject strings that would be silently truncated at a C boundary
pub(crate) fn ensure_no_nul(field: &'static str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(Error::InvalidString { field });
    }
    Ok(())
}

fn malformed(reason: &str) -> Error {
    Error::MalformedUri(reason.to_string())
}

fn validate_resource(resource: &str) -> Result<()> {
    let invalid = || malformed(&format!("invalid resource {resource:?}"));

    let (path, query) = match resource.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (resource, None),
    };

    if !path.starts_with('/') {
        return Err(invalid());
    }
    if let Some(query) = query {
        if query.is_empty() || query.contains('?') {
            return Err(invalid());
        }
    }

    // url keeps broken escapes verbatim
    let escapes_ok = resource.split('%').skip(1).all(|rest| {
        rest.as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !escapes_ok {
        return Err(invalid());
    }
    Ok(())
}
