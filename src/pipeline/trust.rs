//! Reverse-proxy trust recovery.
//!
//! When the server sits behind trusted reverse proxies, the TCP peer
//! address and the plain-http scheme describe the last hop, not the
//! client. This stage recovers the client address and original scheme from
//! configured proxy headers, preserving the observed values as request
//! tags. This logic is security-sensitive: IP-based trust decisions depend
//! on it, so the chain walk must not be "improved".

use std::net::Ipv4Addr;

use tracing::debug;

use crate::config::HttpOptions;
use crate::protocol::{Request, RequestTag};

/// Applies real-IP and real-scheme recovery according to the options.
pub fn recover(options: &HttpOptions, request: &mut Request) {
    if let Some(header) = &options.real_ip_header {
        let recovered = request.headers.get(header).and_then(extract_client_address);
        if let Some(address) = recovered {
            debug!(peer = %request.remote_address, client = %address, "recovered client address");
            let original = std::mem::replace(&mut request.remote_address, address);
            request.set_tag(RequestTag::OriginalAddress, original);
        }
    }

    if let Some(header) = &options.real_scheme_header {
        let scheme = request.headers.get(header).map(|value| value.trim().to_ascii_lowercase());
        if let Some(scheme) = scheme {
            if scheme == "http" || scheme == "https" {
                let original = std::mem::replace(&mut request.scheme, scheme);
                request.set_tag(RequestTag::OriginalScheme, original);
            }
        }
    }
}

/// Extracts the client address from a real-IP header value.
///
/// A direct dotted-quad value is taken as-is. A comma-separated forwarding
/// chain is walked in reverse (closest-to-server first): private and
/// loopback hops are skipped, and the entry immediately behind the first
/// public hop is taken as the client address. When the public hop is the
/// last entry of the walk it is taken itself; an all-private chain yields
/// no override.
fn extract_client_address(value: &str) -> Option<String> {
    let direct = value.trim();
    if direct.parse::<Ipv4Addr>().is_ok() {
        return Some(direct.to_owned());
    }

    if !value.contains(',') {
        return None;
    }

    let mut candidate: Option<&str> = None;
    for entry in value.split(',').rev().map(str::trim) {
        if candidate.is_some() {
            candidate = Some(entry);
            break;
        }
        if !is_private_address(entry) {
            candidate = Some(entry);
        }
    }

    candidate.map(str::to_owned)
}

/// True for RFC 1918 and loopback IPv4 addresses. Entries that do not
/// parse as IPv4 never match and are treated as public hops.
fn is_private_address(entry: &str) -> bool {
    let Ok(address) = entry.parse::<Ipv4Addr>() else {
        return false;
    };
    let octets = address.octets();
    match octets {
        [10, ..] => true,
        [127, ..] => true,
        [172, b, ..] => (16..=31).contains(&b),
        [192, 168, ..] => true,
        _ => false,
    }
}
