use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use ::time::{format_description::well_known, OffsetDateTime};

/// Status classification of a scanned address.
///
/// Ordered: a later variant always carries more information than an earlier one.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    #[default]
    Unknown,
    Dead,
    Alive,
    WithPorts,
}

impl ResultType {
    pub const ALL: [ResultType; 4] = [
        ResultType::Unknown,
        ResultType::Dead,
        ResultType::Alive,
        ResultType::WithPorts,
    ];

    /// Position of the variant, used to index fixed lookup tables.
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultType::Unknown => "unknown",
            ResultType::Dead => "dead",
            ResultType::Alive => "alive",
            ResultType::WithPorts => "alive, with open ports",
        };
        f.write_str(s)
    }
}

/// One column's worth of fetched data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Address(IpAddr),
    Millis(u64),
    Ports(Vec<u16>),
    Count(u64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Address(ip) => write!(f, "{ip}"),
            CellValue::Millis(ms) => write!(f, "{ms} ms"),
            CellValue::Ports(ports) => {
                let joined: Vec<String> = ports.iter().map(u16::to_string).collect();
                f.write_str(&joined.join(","))
            }
            CellValue::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Scan data accumulated for a single address.
///
/// Identity is the address alone; two results for the same address are the
/// same logical row regardless of their values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    address: IpAddr,
    kind: ResultType,
    values: Vec<Option<CellValue>>,
    updated_at: String,
}

impl ScanResult {
    /// A fresh result with `columns` empty values and `Unknown` status.
    pub fn new(address: IpAddr, columns: usize) -> Self {
        Self {
            address,
            kind: ResultType::Unknown,
            values: vec![None; columns],
            updated_at: now_rfc3339(),
        }
    }

    pub fn with_values(address: IpAddr, kind: ResultType, values: Vec<Option<CellValue>>) -> Self {
        Self {
            address,
            kind,
            values,
            updated_at: now_rfc3339(),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn kind(&self) -> ResultType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ResultType) {
        self.kind = kind;
        self.touch();
    }

    pub fn values(&self) -> &[Option<CellValue>] {
        &self.values
    }

    /// Set the value for one column. Panics if `column` is outside the layout.
    pub fn set_value(&mut self, column: usize, value: Option<CellValue>) {
        assert!(
            column < self.values.len(),
            "column {column} outside result layout of {} values",
            self.values.len()
        );
        self.values[column] = value;
        self.touch();
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    /// Drop all accumulated scan data, keeping the address and value layout.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
        self.kind = ResultType::Unknown;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn reset_keeps_identity_and_layout() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
        let mut r = ScanResult::with_values(
            ip,
            ResultType::WithPorts,
            vec![Some(CellValue::Address(ip)), Some(CellValue::Ports(vec![22, 80]))],
        );
        r.reset();
        assert_eq!(r.address(), ip);
        assert_eq!(r.kind(), ResultType::Unknown);
        assert_eq!(r.values().to_vec(), vec![None::<CellValue>, None]);
    }

    #[test]
    fn result_types_are_ordered() {
        assert!(ResultType::Unknown < ResultType::Dead);
        assert!(ResultType::Alive < ResultType::WithPorts);
        assert_eq!(ResultType::WithPorts.ordinal(), 3);
    }

    #[test]
    fn cell_values_display() {
        assert_eq!(CellValue::Ports(vec![22, 443]).to_string(), "22,443");
        assert_eq!(CellValue::Millis(12).to_string(), "12 ms");
    }
}
