use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

/// Network details of a caller, stored with login history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub fn client_info(
    headers: &HeaderMap,
    peer_addr: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> ClientInfo {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    ClientInfo {
        ip_address: client_ip(headers, peer_addr, trusted_proxies).map(|ip| ip.to_string()),
        user_agent,
    }
}

/// The caller's address. `X-Forwarded-For` is only honoured when the direct
/// peer is a trusted proxy; the first hop that is not a proxy wins.
pub fn client_ip(
    headers: &HeaderMap,
    peer_addr: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Option<IpAddr> {
    let peer = peer_addr?;

    if trusted_proxies.iter().any(|net| net.contains(&peer)) {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            let forwarded = xff
                .split(',')
                .filter_map(|s| s.trim().parse::<IpAddr>().ok())
                .find(|ip| !trusted_proxies.iter().any(|net| net.contains(ip)));
            if forwarded.is_some() {
                return forwarded;
            }
        }
    }

    Some(peer)
}
