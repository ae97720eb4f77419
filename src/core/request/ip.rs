//! Client address resolution.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use http::HeaderMap;

/// Proxy headers consulted in order before `REMOTE_ADDR`.
const PROXY_HEADERS: &[&str] = &[
    "client-ip",
    "x-forwarded-for",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

/// First public address found in the proxy headers, then `REMOTE_ADDR`.
///
/// A public `REMOTE_ADDR` wins over nothing; a private one is still
/// returned as the last resort, and `0.0.0.0` when there is none.
pub(super) fn client_ip(headers: &HeaderMap, remote_addr: Option<&str>) -> String {
    let candidates = PROXY_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .chain(remote_addr);

    for value in candidates {
        let first = value.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = first.parse::<IpAddr>() {
            if is_public(&ip) {
                return first.to_string();
            }
        }
    }

    remote_addr.unwrap_or("0.0.0.0").to_string()
}

/// Neither private nor reserved.
pub(super) fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, ..] = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        || a >= 240)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_v4(&v4);
    }
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80)
}
