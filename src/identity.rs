// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identity resolution from connection metadata.
//!
//! Resolution order is fixed: first entry of `X-Forwarded-For` →
//! `X-Real-IP` → socket peer address → `"unknown"`. Do not reorder:
//! the order controls spoofability. A caller controls `X-Forwarded-For`
//! unless a trusted reverse proxy strips or rewrites it, so any limit
//! tier stricter than IP defaults should key on an authenticated
//! session identity instead (see [`crate::middleware::AuthenticatedCaller`]).

use std::net::IpAddr;

/// Identity used when no address information is available at all.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Derive a stable caller identity from connection metadata.
pub fn client_identity(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<IpAddr>,
) -> String {
    if let Some(header) = forwarded_for {
        // The left-most entry is the originating client as reported by
        // the first proxy hop.
        if let Some(first) = header.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(ip) = real_ip {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    match peer {
        Some(addr) => addr.to_string(),
        None => UNKNOWN_IDENTITY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let id = client_identity(Some("203.0.113.7, 70.41.3.18"), None, None);
        assert_eq!(id, "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_trims_whitespace() {
        let id = client_identity(Some("  203.0.113.7 ,70.41.3.18"), None, None);
        assert_eq!(id, "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        let id = client_identity(Some("  ,  "), Some("198.51.100.4"), None);
        assert_eq!(id, "198.51.100.4");
    }

    #[test]
    fn test_real_ip_beats_peer() {
        let peer = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        let id = client_identity(None, Some("198.51.100.4"), Some(peer));
        assert_eq!(id, "198.51.100.4");
    }

    #[test]
    fn test_peer_address_fallback() {
        let peer = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));
        let id = client_identity(None, None, Some(peer));
        assert_eq!(id, "127.0.0.2");
    }

    #[test]
    fn test_unknown_when_nothing_available() {
        assert_eq!(client_identity(None, None, None), UNKNOWN_IDENTITY);
    }
}
