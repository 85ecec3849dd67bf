use crate::error::TableError;
use crate::fetchers::{self, Fetcher};
use crate::types::{CellValue, ResultType, ScanResult};
use crate::ui::UiHandle;
use crate::view::RowChange;
use anyhow::Result;
use serde::Serialize;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub ports: Vec<u16>,
    /// Hosts probed at the same time.
    pub concurrency: usize,
    /// Connect attempts in flight across all hosts.
    pub max_sockets: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub hosts: u64,
    pub alive: u64,
    pub with_ports: u64,
    pub rejected: u64,
}

/// What a TCP-connect sweep of one host found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostProbe {
    /// Time to the first answer, open or refused.
    pub latency_ms: Option<u64>,
    pub open_ports: Vec<u16>,
}

impl HostProbe {
    pub fn kind(&self) -> ResultType {
        match (self.latency_ms, self.open_ports.is_empty()) {
            (None, _) => ResultType::Dead,
            (Some(_), true) => ResultType::Alive,
            (Some(_), false) => ResultType::WithPorts,
        }
    }

    /// Lay the probe out as one value per fetcher.
    pub fn to_result(&self, address: IpAddr, fetchers: &[Fetcher]) -> ScanResult {
        let alive = self.latency_ms.is_some();
        let values = fetchers
            .iter()
            .map(|f| match f.id.as_str() {
                fetchers::IP => Some(CellValue::Address(address)),
                fetchers::PING => self.latency_ms.map(CellValue::Millis),
                fetchers::PORTS if !self.open_ports.is_empty() => {
                    Some(CellValue::Ports(self.open_ports.clone()))
                }
                fetchers::OPEN_COUNT if alive => {
                    Some(CellValue::Count(self.open_ports.len() as u64))
                }
                _ => None,
            })
            .collect();
        ScanResult::with_values(address, self.kind(), values)
    }
}

/// Probe every target and stream results into the table behind `ui`.
///
/// Each host first shows up as an `Unknown` row, which is then updated in
/// place with the probe outcome. Every submission waits for the UI thread.
pub async fn scan_into_table(
    targets: &[IpAddr],
    fetchers: &[Fetcher],
    opts: &ScanOptions,
    ui: &UiHandle,
    cancel: CancellationToken,
) -> Result<ScanSummary> {
    let sem = Arc::new(Semaphore::new(opts.concurrency.clamp(1, 1_000)));
    let sockets = Arc::new(Semaphore::new(opts.max_sockets.clamp(1, 5_000)));
    let fetchers: Arc<[Fetcher]> = fetchers.into();
    let ports: Arc<[u16]> = opts.ports.as_slice().into();
    let mut set = JoinSet::new();

    for &ip in targets {
        if cancel.is_cancelled() {
            break;
        }
        let permit = sem.clone().acquire_owned().await?;
        let ui = ui.clone();
        let fetchers = fetchers.clone();
        let ports = ports.clone();
        let sockets = sockets.clone();
        let cancel = cancel.clone();
        let timeout = opts.timeout;

        set.spawn(async move {
            let _permit = permit;
            scan_host(ip, &fetchers, &ports, timeout, sockets, &ui, cancel).await
        });
    }

    let mut summary = ScanSummary::default();
    while let Some(joined) = set.join_next().await {
        summary.hosts += 1;
        match joined? {
            Ok(Some(kind)) => {
                if kind >= ResultType::Alive {
                    summary.alive += 1;
                }
                if kind == ResultType::WithPorts {
                    summary.with_ports += 1;
                }
            }
            Ok(None) => {}
            Err(TableError::UiThreadPanicked) => {
                cancel.cancel();
                set.abort_all();
                return Err(TableError::UiThreadPanicked.into());
            }
            Err(e) => {
                tracing::warn!("result rejected by table: {e}");
                summary.rejected += 1;
            }
        }
    }
    tracing::info!(
        hosts = summary.hosts,
        alive = summary.alive,
        with_ports = summary.with_ports,
        "scan finished"
    );
    Ok(summary)
}

async fn scan_host(
    ip: IpAddr,
    fetchers: &[Fetcher],
    ports: &[u16],
    timeout: Duration,
    sockets: Arc<Semaphore>,
    ui: &UiHandle,
    cancel: CancellationToken,
) -> Result<Option<ResultType>, TableError> {
    let mut pending = ScanResult::new(ip, fetchers.len());
    if let Some(col) = fetchers.iter().position(|f| f.id == fetchers::IP) {
        pending.set_value(col, Some(CellValue::Address(ip)));
    }
    ui.add_or_update(pending).await?;

    let probe = tokio::select! {
        p = probe_host(ip, ports, timeout, sockets) => p,
        _ = cancel.cancelled() => return Ok(None),
    };
    let result = probe.to_result(ip, fetchers);
    let kind = result.kind();
    match ui.add_or_update(result).await? {
        RowChange::Ignored => Ok(None),
        _ => Ok(Some(kind)),
    }
}

/// Connect to every port of `ip`, holding one `sockets` permit per attempt.
pub async fn probe_host(
    ip: IpAddr,
    ports: &[u16],
    timeout: Duration,
    sockets: Arc<Semaphore>,
) -> HostProbe {
    let start = Instant::now();
    let mut set = JoinSet::new();
    for &port in ports {
        let Ok(permit) = sockets.clone().acquire_owned().await else {
            break;
        };
        set.spawn(async move {
            let _permit = permit;
            let res = time::timeout(timeout, TcpStream::connect(SocketAddr::new(ip, port)))
                .await
                .map(|connected| connected.map(drop));
            (port, res)
        });
    }

    let mut probe = HostProbe::default();
    while let Some(joined) = set.join_next().await {
        let Ok((port, res)) = joined else { continue };
        let answered = match res {
            Ok(Ok(())) => {
                probe.open_ports.push(port);
                true
            }
            // a reset still proves the host is up
            Ok(Err(e)) => e.kind() == ErrorKind::ConnectionRefused,
            Err(_) => false,
        };
        if answered && probe.latency_ms.is_none() {
            probe.latency_ms = Some(start.elapsed().as_millis() as u64);
        }
    }
    probe.open_ports.sort_unstable();
    tracing::debug!(%ip, open = probe.open_ports.len(), "host probed");
    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::builtin_fetchers;
    use std::net::Ipv4Addr;

    const HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 5, 5));

    #[test]
    fn probe_kinds() {
        assert_eq!(HostProbe::default().kind(), ResultType::Dead);
        let alive = HostProbe { latency_ms: Some(2), open_ports: vec![] };
        assert_eq!(alive.kind(), ResultType::Alive);
        let open = HostProbe { latency_ms: Some(2), open_ports: vec![22] };
        assert_eq!(open.kind(), ResultType::WithPorts);
    }

    #[test]
    fn values_follow_fetcher_order() {
        let probe = HostProbe { latency_ms: Some(4), open_ports: vec![22, 80] };
        let mut fetchers = builtin_fetchers();
        fetchers.reverse();
        let r = probe.to_result(HOST, &fetchers);
        assert_eq!(
            r.values(),
            &[
                Some(CellValue::Count(2)),
                Some(CellValue::Ports(vec![22, 80])),
                Some(CellValue::Millis(4)),
                Some(CellValue::Address(HOST)),
            ]
        );
    }

    #[test]
    fn dead_host_leaves_cells_empty() {
        let r = HostProbe::default().to_result(HOST, &builtin_fetchers());
        assert!(r.values()[1..].iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn local_listener_is_found() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = probe_host(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            &[port],
            Duration::from_millis(500),
            Arc::new(Semaphore::new(4)),
        )
        .await;
        assert_eq!(probe.open_ports, vec![port]);
        assert!(probe.latency_ms.is_some());
    }

    #[tokio::test]
    async fn socket_limit_holds_across_many_ports() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut ports: Vec<u16> = (1..=200).collect();
        ports.push(port);

        let sockets = Arc::new(Semaphore::new(2));
        let probe = probe_host(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            &ports,
            Duration::from_millis(500),
            sockets.clone(),
        )
        .await;
        assert!(probe.open_ports.contains(&port));
        assert_eq!(probe.kind(), ResultType::WithPorts);
        assert_eq!(sockets.available_permits(), 2);
    }
}
