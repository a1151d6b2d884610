//! Destination filtering for relayed connections
//!
//! The relay only forwards to public destinations. Loopback, link-local,
//! private, and multicast ranges are refused so a phone on the vehicle
//! hotspot cannot reach the head unit itself or anything else on the local
//! segment through the tunnel.

use crate::relay::command::TargetAddr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;

/// Whether `ip` falls in a range the relay refuses to connect to.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_link_local() || ip.is_private() || ip.is_multicast()
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    // An IPv4-mapped address is judged by the IPv4 rules.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(v4);
    }

    let seg = ip.segments();
    ip.is_loopback()
        || ip.is_multicast()
        // fe80::/10 link-local
        || seg[0] & 0xffc0 == 0xfe80
        // fec0::/10 site-local
        || seg[0] & 0xffc0 == 0xfec0
        // fc00::/7 unique local
        || seg[0] & 0xfe00 == 0xfc00
}

/// Whether `host` names a blocked destination.
///
/// IP literals are judged directly. Domain names are resolved and judged by
/// their first address; a name that does not resolve is not blocked here,
/// the connect attempt fails on its own.
pub async fn is_blocked_address(host: &str, port: u16) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_blocked_ip(ip);
    }

    match lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next().map(|a| is_blocked_ip(a.ip())).unwrap_or(false),
        Err(_) => false,
    }
}

/// Whether a CONNECT target is blocked.
pub async fn is_blocked_target(target: &TargetAddr) -> bool {
    match target {
        TargetAddr::Ip(addr) => is_blocked_ip(addr.ip()),
        TargetAddr::Domain(host, port) => is_blocked_address(host, *port).await,
    }
}
