//! Local-IP discovery. Strategies are tried in order of how likely they
//! are to see the *host's* address rather than the container's: namespace
//! entry first, then host routing pseudo-files, then the container's own
//! interfaces. Loopback and the 172.16.0.0/12 container block are never
//! returned.

use super::nsenter::HostCommandRunner;
use super::sources::SourceChain;
use regex::Regex;
use std::net::Ipv4Addr;
use tracing::debug;

pub const UNAVAILABLE: &str = "unavailable";

const DOTTED_QUAD: &str = r"(?:\d{1,3}\.){3}\d{1,3}";

pub fn discover_local_ip(chain: &SourceChain, runner: &dyn HostCommandRunner) -> String {
    if let Some(ip) = discover_from_host_sources(chain, runner) {
        return ip.to_string();
    }
    if let Some(ip) = local_interface_ipv4() {
        debug!(ip = %ip, "local IP from container interface enumeration");
        return ip.to_string();
    }
    UNAVAILABLE.to_string()
}

fn discover_from_host_sources(
    chain: &SourceChain,
    runner: &dyn HostCommandRunner,
) -> Option<Ipv4Addr> {
    if runner.available() {
        if let Some(ip) = runner
            .run("hostname -i 2>/dev/null")
            .as_deref()
            .and_then(first_token_ipv4)
            .filter(|ip| !is_rejected(*ip))
        {
            debug!(ip = %ip, "local IP from nsenter hostname -i");
            return Some(ip);
        }

        if let Some(ip) = runner
            .run("ip -4 addr show 2>/dev/null | grep 'inet ' | grep -v '127.0.0.1' | head -1")
            .as_deref()
            .and_then(inet_ipv4)
            .filter(|ip| !is_rejected(*ip))
        {
            debug!(ip = %ip, "local IP from nsenter ip addr show");
            return Some(ip);
        }
    }

    let fib_trie = chain.read("/proc/net/fib_trie", String::new);
    if let Some(ip) = pick_preferred(&ips_from_text(&fib_trie)) {
        debug!(ip = %ip, "local IP from fib_trie");
        return Some(ip);
    }

    let route = chain.read("/proc/net/route", String::new);
    if let Some(ip) = ip_from_route(&route, &fib_trie) {
        debug!(ip = %ip, "local IP from default route");
        return Some(ip);
    }

    let arp = chain.read("/proc/net/arp", String::new);
    if let Some(ip) = pick_preferred(&ips_from_arp(&arp)) {
        debug!(ip = %ip, "local IP from arp table");
        return Some(ip);
    }

    None
}

/// 172.16.0.0/12, the default Docker bridge allocation range.
fn in_container_block(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 172 && (16..=31).contains(&b)
}

fn is_rejected(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || in_container_block(ip)
}

fn first_token_ipv4(text: &str) -> Option<Ipv4Addr> {
    text.split_whitespace().next()?.parse().ok()
}

/// First address of `inet <ip>/<mask>` formatted output.
fn inet_ipv4(text: &str) -> Option<Ipv4Addr> {
    let re = Regex::new(&format!(r"inet\s+({DOTTED_QUAD})")).expect("static regex");
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Every acceptable dotted quad in the text, deduplicated in order of
/// first appearance.
fn ips_from_text(text: &str) -> Vec<Ipv4Addr> {
    let re = Regex::new(DOTTED_QUAD).expect("static regex");
    let mut out: Vec<Ipv4Addr> = Vec::new();
    for m in re.find_iter(text) {
        let Ok(ip) = m.as_str().parse::<Ipv4Addr>() else {
            continue;
        };
        if !is_rejected(ip) && !out.contains(&ip) {
            out.push(ip);
        }
    }
    out
}

/// Common-private-range preference: a 192.168.* or 10.* address is more
/// likely the LAN-facing one than, say, a carrier-grade NAT range.
fn pick_preferred(ips: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    ips.iter()
        .find(|ip| {
            let [a, b, _, _] = ip.octets();
            (a == 192 && b == 168) || a == 10
        })
        .or_else(|| ips.first())
        .copied()
}

/// Default-route row of /proc/net/route: decode its 8-hex-digit address
/// column (little-endian), or locate that interface's address inside the
/// fib_trie text when decoding yields nothing usable.
fn ip_from_route(route: &str, fib_trie: &str) -> Option<Ipv4Addr> {
    for line in route.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let (iface, dest, hex) = (parts[0], parts[1], parts[2]);
        if iface == "lo" || dest != "00000000" {
            continue;
        }

        if let Some(ip) = decode_route_hex(hex).filter(|ip| !route_rejected(*ip)) {
            return Some(ip);
        }

        let iface_re = Regex::new(&format!(
            r"(?i){}.*?({DOTTED_QUAD})",
            regex::escape(iface)
        ))
        .expect("escaped interface regex");
        if let Some(ip) = iface_re
            .captures(fib_trie)
            .and_then(|c| c.get(1)?.as_str().parse::<Ipv4Addr>().ok())
            .filter(|ip| !route_rejected(*ip))
        {
            return Some(ip);
        }
    }
    None
}

// The route strategy predates the /12-wide filter and only rejects the
// stock Docker bridge subnets.
fn route_rejected(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback() || ip.is_unspecified() || (a == 172 && (17..=19).contains(&b))
}

/// Eight hex digits in little-endian byte order, as /proc/net/route
/// stores addresses.
fn decode_route_hex(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 || !hex.is_ascii() {
        return None;
    }
    let byte = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Ipv4Addr::new(
        byte(6..8)?,
        byte(4..6)?,
        byte(2..4)?,
        byte(0..2)?,
    ))
}

/// First-column addresses of /proc/net/arp rows (header skipped).
fn ips_from_arp(arp: &str) -> Vec<Ipv4Addr> {
    arp.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next()?.parse::<Ipv4Addr>().ok())
        .filter(|ip| !is_rejected(*ip))
        .collect()
}

/// Terminal fallback: the container's own first non-internal IPv4 address
/// outside the container block.
fn local_interface_ipv4() -> Option<Ipv4Addr> {
    use nix::net::if_::InterfaceFlags;

    let addrs = nix::ifaddrs::getifaddrs().ok()?;
    for ifa in addrs {
        if ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK) {
            continue;
        }
        let Some(storage) = ifa.address else {
            continue;
        };
        let Some(sin) = storage.as_sockaddr_in() else {
            continue;
        };
        let ip = *std::net::SocketAddrV4::from(*sin).ip();
        if !is_rejected(ip) {
            return Some(ip);
        }
    }
    None
}
