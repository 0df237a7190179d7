//! Peer address allow-list for reload endpoints.
//!
//! Entries are IPv4/IPv6 addresses or CIDR ranges separated by whitespace or
//! commas. The keyword `all` admits everyone, as does an empty list.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Error raised while parsing an allow-list string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("invalid prefix length in {0:?}")]
    InvalidPrefix(String),
}

/// A parsed CIDR entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CidrEntry {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrEntry {
    fn parse(entry: &str) -> Result<Self, AllowListError> {
        let (ip_str, prefix) = match entry.split_once('/') {
            Some((ip, prefix)) => (ip, Some(prefix)),
            None => (entry, None),
        };

        let network: IpAddr = ip_str
            .parse()
            .map_err(|_| AllowListError::InvalidAddress(entry.to_string()))?;

        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= max)
                .ok_or_else(|| AllowListError::InvalidPrefix(entry.to_string()))?,
            None => max,
        };

        Ok(Self {
            network,
            prefix_len,
        })
    }

    fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, normalize(ip)) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

fn mask_u32(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        !0u32 << (32 - u32::from(prefix_len))
    }
}

fn mask_u128(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        !0u128 << (128 - u32::from(prefix_len))
    }
}

// IPv4 peers on a dual-stack socket arrive as ::ffff:a.b.c.d.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Set of peers allowed to reach a reload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    /// `None` admits every peer.
    entries: Option<Vec<CidrEntry>>,
}

impl AllowList {
    /// Parse an allow-list string.
    pub fn parse(raw: &str) -> Result<Self, AllowListError> {
        let tokens: Vec<&str> = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() || tokens.iter().any(|t| t.eq_ignore_ascii_case("all")) {
            return Ok(Self::default());
        }

        let entries = tokens
            .into_iter()
            .map(CidrEntry::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries: Some(entries),
        })
    }

    /// Whether every peer is admitted.
    pub fn allows_all(&self) -> bool {
        self.entries.is_none()
    }

    /// Check whether a peer address is admitted.
    pub fn permits(&self, ip: IpAddr) -> bool {
        match &self.entries {
            None => true,
            Some(entries) => entries.iter().any(|entry| entry.contains(ip)),
        }
    }
}

/// Reject peers outside the site's allow-list with 403.
pub async fn allow_list_middleware(
    State(allow): State<Arc<AllowList>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if allow.permits(peer.ip()) {
        return next.run(req).await;
    }

    tracing::warn!(
        peer = %peer,
        path = %req.uri().path(),
        "Peer not in allow-list"
    );
    StatusCode::FORBIDDEN.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_allows_everyone() {
        let list = AllowList::parse("  ").unwrap();
        assert!(list.allows_all());
        assert!(list.permits(ip("203.0.113.9")));
    }

    #[test]
    fn test_all_keyword() {
        let list = AllowList::parse("10.0.0.1, all").unwrap();
        assert!(list.allows_all());
    }

    #[test]
    fn test_single_address_and_cidr() {
        let list = AllowList::parse("127.0.0.1 10.0.0.0/8,192.168.1.0/24").unwrap();
        assert!(list.permits(ip("127.0.0.1")));
        assert!(list.permits(ip("10.200.3.4")));
        assert!(list.permits(ip("192.168.1.77")));
        assert!(!list.permits(ip("192.168.2.1")));
        assert!(!list.permits(ip("127.0.0.2")));
    }

    #[test]
    fn test_ipv6_and_mapped_ipv4() {
        let list = AllowList::parse("::1 2001:db8::/32 127.0.0.1").unwrap();
        assert!(list.permits(ip("::1")));
        assert!(list.permits(ip("2001:db8:1::5")));
        assert!(!list.permits(ip("2001:db9::1")));
        assert!(list.permits(ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn test_zero_prefix_matches_family() {
        let list = AllowList::parse("0.0.0.0/0").unwrap();
        assert!(list.permits(ip("8.8.8.8")));
        assert!(!list.permits(ip("2001:db8::1")));
    }

    #[test]
    fn test_invalid_entries() {
        assert_eq!(
            AllowList::parse("300.1.1.1"),
            Err(AllowListError::InvalidAddress("300.1.1.1".into()))
        );
        assert_eq!(
            AllowList::parse("10.0.0.0/33"),
            Err(AllowListError::InvalidPrefix("10.0.0.0/33".into()))
        );
        assert_eq!(
            AllowList::parse("10.0.0.0/x"),
            Err(AllowListError::InvalidPrefix("10.0.0.0/x".into()))
        );
    }
}
