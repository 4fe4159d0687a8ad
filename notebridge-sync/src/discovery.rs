//! Turning a discovered service into something to connect to.
//!
//! Browsing and resolving are done by the platform; this module only
//! consumes the result. A service yields up to two URLs: one built from a
//! resolved address, and one from the advertised hostname for when the
//! address route fails.

use std::net::{IpAddr, Ipv6Addr};

/// Bonjour/mDNS service type the host advertises.
pub const SERVICE_TYPE: &str = "_notebridge._tcp";

/// Port the host listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8080;

/// A resolved service record.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredService {
    /// Human-readable instance name
    pub name: String,
    /// Advertised hostname, e.g. `studio.local.`
    pub host_name: Option<String>,
    pub port: u16,
    /// Resolved addresses, in resolver order
    pub addresses: Vec<IpAddr>,
}

impl DiscoveredService {
    /// Build the connect plan, or `None` if there is nothing to dial.
    ///
    /// IPv4 is preferred for the primary URL since link-local IPv6 results
    /// frequently lack a usable scope.
    pub fn connect_target(&self) -> Option<ConnectTarget> {
        let address = self
            .addresses
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| self.addresses.first());

        let primary = address.map(|a| ws_url(&a.to_string(), self.port));
        let fallback = self
            .host_name
            .as_deref()
            .map(|h| h.trim_end_matches('.'))
            .filter(|h| !h.is_empty())
            .map(|h| ws_url(h, self.port));

        match (primary, fallback) {
            (None, None) => None,
            (Some(primary), fallback) => Some(ConnectTarget { primary, fallback }),
            (None, Some(fallback)) => Some(ConnectTarget::direct(fallback)),
        }
    }
}

/// URLs to try, in order. The fallback is tried at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTarget {
    pub primary: String,
    pub fallback: Option<String>,
}

impl ConnectTarget {
    /// Single URL, no fallback.
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            primary: url.into(),
            fallback: None,
        }
    }

    /// Fallback URL, unless it's the same as the primary.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback
            .as_deref()
            .filter(|f| *f != self.primary)
    }
}

/// `ws://host:port`, bracketing IPv6 literals.
pub fn ws_url(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("ws://[{host}]:{port}")
    } else {
        format!("ws://{host}:{port}")
    }
}
