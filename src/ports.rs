use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// Parse a port list such as `22,80,8000-8010` into deduplicated ports,
/// keeping first-seen order.
pub fn parse_port_list(s: &str) -> Result<Vec<u16>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (
                parse_port(a.trim()).with_context(|| format!("invalid range start: {part}"))?,
                parse_port(b.trim()).with_context(|| format!("invalid range end: {part}"))?,
            ),
            None => {
                let p = parse_port(part).with_context(|| format!("invalid port: {part}"))?;
                (p, p)
            }
        };
        if start > end {
            bail!("invalid range {start}-{end} (start > end)");
        }
        out.extend((start..=end).filter(|p| seen.insert(*p)));
    }
    Ok(out)
}

/// Ports probed when none are given.
pub fn default_ports() -> Vec<u16> {
    vec![21, 22, 23, 25, 53, 80, 110, 139, 143, 443, 445, 3389, 8080]
}

fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s.parse()?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
