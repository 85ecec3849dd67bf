use anyhow::{bail, Context, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::{IpNet, Ipv4Net};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

/// Upper bound on addresses a single target spec may expand to.
pub const MAX_TARGETS: usize = 1 << 16;

/// Resolve a target spec into individual addresses.
///
/// Accepted forms (comma separated, mixed freely):
/// - single address: `192.168.1.10`
/// - CIDR: `192.168.1.0/24` (network and broadcast excluded)
/// - inclusive range: `192.168.1.10-192.168.1.20`
pub fn parse_targets(spec: &str) -> Result<Vec<IpAddr>> {
    let mut out = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.contains('/') {
            let net: IpNet = part
                .parse()
                .with_context(|| format!("invalid CIDR: {part}"))?;
            if let IpNet::V4(n4) = net {
                if 1u64 << (32 - n4.prefix_len()) > MAX_TARGETS as u64 {
                    bail!("{part} holds more than {MAX_TARGETS} addresses");
                }
            }
            out.extend(expand_cidr_to_ips(net));
        } else if let Some((a, b)) = part.split_once('-') {
            let start: Ipv4Addr = a
                .trim()
                .parse()
                .with_context(|| format!("invalid range start: {a}"))?;
            let end: Ipv4Addr = b
                .trim()
                .parse()
                .with_context(|| format!("invalid range end: {b}"))?;
            out.extend(expand_range(start, end)?.into_iter().map(IpAddr::V4));
        } else {
            let ip: IpAddr = part
                .parse()
                .with_context(|| format!("invalid address: {part}"))?;
            out.push(ip);
        }
        if out.len() > MAX_TARGETS {
            bail!("target spec expands to more than {MAX_TARGETS} addresses");
        }
    }
    Ok(out)
}

/// Inclusive IPv4 range. Errors if `start > end`.
pub fn expand_range(start: Ipv4Addr, end: Ipv4Addr) -> Result<Vec<Ipv4Addr>> {
    let (s, e) = (u32::from(start), u32::from(end));
    if s > e {
        bail!("invalid range {start}-{end} (start > end)");
    }
    if (e - s) as usize >= MAX_TARGETS {
        bail!("range {start}-{end} exceeds {MAX_TARGETS} addresses");
    }
    Ok((s..=e).map(Ipv4Addr::from).collect())
}

/// Host addresses of a CIDR. IPv6 networks are not expanded.
pub fn expand_cidr_to_ips(cidr: IpNet) -> Vec<IpAddr> {
    match cidr {
        IpNet::V4(n4) => n4.hosts().map(IpAddr::V4).collect(),
        IpNet::V6(_) => Vec::new(),
    }
}

/// The /24 networks of all non-loopback local IPv4 interfaces, sorted.
pub fn detect_local_cidrs() -> Result<Vec<IpNet>> {
    let mut set = BTreeSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            let o = v4.ip.octets();
            set.insert(Ipv4Net::new(Ipv4Addr::new(o[0], o[1], o[2], 0), 24)?);
        }
    }
    Ok(set.into_iter().map(IpNet::V4).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_spec() {
        let ips = parse_targets("10.0.0.1, 10.0.1.0/30 ,10.0.2.5-10.0.2.6").unwrap();
        let expected: Vec<IpAddr> = [
            "10.0.0.1", "10.0.1.1", "10.0.1.2", "10.0.2.5", "10.0.2.6",
        ]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
        assert_eq!(ips, expected);
    }

    #[test]
    fn reversed_range_rejected() {
        assert!(parse_targets("10.0.0.9-10.0.0.1").is_err());
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_targets("not-an-ip").is_err());
        assert!(parse_targets("10.0.0.0/40").is_err());
    }
}
