use std::fs::File;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use scan_table_rs::config::DimensionsConfig;
use scan_table_rs::events::{ScanState, TableActions, UiEvent};
use scan_table_rs::fetchers::FetcherRegistry;
use scan_table_rs::scanner::{self, ScanOptions};
use scan_table_rs::ui::{UiState, UiThread};
use scan_table_rs::{ports, targets, ResultTable};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// scan-table-rs — live LAN scan results in a lazily rendered table.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scan-table-rs",
    version,
    about = "Scan a LAN range and show the results in a lazily rendered table.",
    long_about = None
)]
struct Cli {
    /// Addresses, CIDRs or ranges (comma separated). If omitted, auto-detect local /24s.
    #[arg(long)]
    targets: Option<String>,

    /// Ports to probe, e.g. `22,80,8000-8010`.
    #[arg(long)]
    ports: Option<String>,

    /// Hosts probed at the same time.
    #[arg(long, default_value_t = 64)]
    concurrency: usize,

    /// Connect attempts in flight at once, across all hosts.
    #[arg(long = "max-sockets", default_value_t = 1000)]
    max_sockets: usize,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 400)]
    timeout_ms: u64,

    /// Columns to show, by fetcher id (ip, ping, ports, open.count).
    #[arg(long, value_delimiter = ',')]
    fetchers: Vec<String>,

    /// JSON file holding persisted column widths.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write all results as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the details view for this address after the scan.
    #[arg(long)]
    details: Option<IpAddr>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Prints the details view to stdout.
struct PrintDetails;

impl TableActions for PrintDetails {
    fn show_details(&mut self, details: &str) {
        println!("\n{details}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let registry = FetcherRegistry::default();
    if !cli.fetchers.is_empty() {
        registry.select(cli.fetchers.as_slice())?;
    }
    let dimensions = match cli.config.as_deref() {
        Some(path) => DimensionsConfig::load_or_default(path),
        None => DimensionsConfig::default(),
    };

    let addrs = match cli.targets.as_deref() {
        Some(spec) => targets::parse_targets(spec)?,
        None => {
            let mut all = Vec::new();
            for cidr in targets::detect_local_cidrs()? {
                let hosts = targets::expand_cidr_to_ips(cidr);
                tracing::info!("detected local network {} ({} hosts)", cidr, hosts.len());
                all.extend(hosts);
            }
            all
        }
    };
    let opts = ScanOptions {
        ports: match cli.ports.as_deref() {
            Some(list) => ports::parse_port_list(list)?,
            None => ports::default_ports(),
        },
        concurrency: cli.concurrency,
        max_sockets: cli.max_sockets,
        timeout: Duration::from_millis(cli.timeout_ms),
    };
    tracing::info!(
        targets = addrs.len(),
        ports = opts.ports.len(),
        concurrency = opts.concurrency,
        max_sockets = opts.max_sockets,
        "starting scan"
    );

    let fetchers = registry.selected();
    let table = ResultTable::new(fetchers.clone(), &dimensions);
    let ui = UiThread::spawn(UiState::new(table, dimensions), registry.subscribe())
        .context("failed to start UI thread")?;
    let handle = ui.handle();

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    handle.set_scan_state(ScanState::Scanning).await?;
    let summary = scanner::scan_into_table(&addrs, &fetchers, &opts, &handle, cancel).await?;
    handle.set_scan_state(ScanState::Idle).await?;

    if let Some(address) = cli.details {
        let found = handle
            .exec(move |ui| {
                let index = ui.table.scanning_results().index_of(address)?;
                ui.handle_event(UiEvent::Selection(vec![index]), &mut PrintDetails);
                ui.handle_event(UiEvent::DoubleClick, &mut PrintDetails);
                Some(index)
            })
            .await?
            .flatten();
        if found.is_none() {
            tracing::warn!("{address} is not in the result table");
        }
    }

    let mut state = tokio::task::spawn_blocking(move || ui.shutdown())
        .await?
        .context("UI thread exited without its state")?;

    print_table(&mut state.table);
    println!(
        "\nHosts: {} (alive: {}, with ports: {})",
        summary.hosts, summary.alive, summary.with_ports
    );

    if let Some(path) = cli.output.as_deref() {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        state.table.scanning_results().export_json(file)?;
        println!("Wrote JSON results to {}", path.display());
    }
    if let Some(path) = cli.config.as_deref() {
        state.dimensions.save(path)?;
    }

    Ok(())
}

fn print_table(table: &mut ResultTable) {
    let labels: Vec<String> = table.columns().iter().map(|c| c.label().to_string()).collect();
    let rows = table.render_window(0, table.row_count());

    let mut widths: Vec<usize> = labels.iter().map(String::len).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(&row.cells) {
            *w = (*w).max(cell.len().min(40));
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    println!("\n{:<14}{}", "status", line(labels.as_slice()));
    println!("{:<14}{}", "-".repeat(12), line(dashes.as_slice()));
    for row in &rows {
        println!("{:<14}{}", row.icon, line(row.cells.as_slice()));
    }
}
