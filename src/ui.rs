//! The single thread that owns the result table.
//!
//! Nothing outside this thread touches the table directly. Producers hold a
//! [`UiHandle`] and submit closures over a queue; each submission blocks the
//! producer until the UI thread has run it (a rendezvous), so a scan worker
//! never moves on before its result is recorded.

use crate::config::DimensionsConfig;
use crate::error::TableError;
use crate::events::{EventOutcome, EventRouter, ScanState, TableActions, UiEvent};
use crate::fetchers::Fetcher;
use crate::types::ScanResult;
use crate::view::{ResultTable, RowChange};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot, watch};

/// Everything the UI thread owns.
#[derive(Debug)]
pub struct UiState {
    pub table: ResultTable,
    pub dimensions: DimensionsConfig,
    pub scan_state: ScanState,
    router: EventRouter,
}

impl UiState {
    pub fn new(table: ResultTable, dimensions: DimensionsConfig) -> Self {
        Self {
            table,
            dimensions,
            scan_state: ScanState::Idle,
            router: EventRouter::new(),
        }
    }

    /// Route a UI signal. Column resizes are also written to `dimensions`.
    pub fn handle_event(&mut self, event: UiEvent, actions: &mut dyn TableActions) -> EventOutcome {
        let resized = match &event {
            UiEvent::ColumnResize { column, width } => Some((*column, *width)),
            _ => None,
        };
        let outcome = self
            .router
            .dispatch(event, &mut self.table, self.scan_state, actions);
        if let Some((column, width)) = resized {
            if let Some(c) = self.table.columns().get(column) {
                let label = c.label().to_string();
                self.dimensions.set_column_width(&label, width);
            }
        }
        outcome
    }

    fn rebuild_columns(&mut self, fetchers: Vec<Fetcher>) {
        self.table.rebuild_columns(fetchers, &self.dimensions);
    }
}

type Job = Box<dyn FnOnce(&mut UiState) + Send>;

enum Command {
    Exec(Job),
    Shutdown,
}

/// Cloneable, thread-safe entry point into the UI thread.
#[derive(Clone, Debug)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<Command>,
    /// Set once the loop is told to stop or stops on its own. A lost reply
    /// without it means the thread died mid-job.
    closing: Arc<AtomicBool>,
}

impl UiHandle {
    /// Run `f` on the UI thread and wait for its result.
    ///
    /// Returns `Ok(None)` once the UI thread has shut down, and
    /// [`TableError::UiThreadPanicked`] if it died instead.
    pub async fn exec<R, F>(&self, f: F) -> Result<Option<R>, TableError>
    where
        R: Send + 'static,
        F: FnOnce(&mut UiState) -> R + Send + 'static,
    {
        let Some(done) = self.submit(f) else {
            return self.gone();
        };
        match done.await {
            Ok(r) => Ok(Some(r)),
            Err(_) => self.gone(),
        }
    }

    /// Blocking form of [`exec`](Self::exec) for plain threads.
    ///
    /// Must not be called from inside an async runtime.
    pub fn exec_blocking<R, F>(&self, f: F) -> Result<Option<R>, TableError>
    where
        R: Send + 'static,
        F: FnOnce(&mut UiState) -> R + Send + 'static,
    {
        let Some(done) = self.submit(f) else {
            return self.gone();
        };
        match done.blocking_recv() {
            Ok(r) => Ok(Some(r)),
            Err(_) => self.gone(),
        }
    }

    /// Record a result on the UI thread, returning once it is in the store.
    pub async fn add_or_update(&self, result: ScanResult) -> Result<RowChange, TableError> {
        self.exec(move |ui| ui.table.add_or_update(result))
            .await?
            .unwrap_or(Ok(RowChange::Ignored))
    }

    pub fn add_or_update_blocking(&self, result: ScanResult) -> Result<RowChange, TableError> {
        self.exec_blocking(move |ui| ui.table.add_or_update(result))?
            .unwrap_or(Ok(RowChange::Ignored))
    }

    pub async fn set_scan_state(&self, state: ScanState) -> Result<(), TableError> {
        self.exec(move |ui| ui.scan_state = state).await?;
        Ok(())
    }

    fn submit<R, F>(&self, f: F) -> Option<oneshot::Receiver<R>>
    where
        R: Send + 'static,
        F: FnOnce(&mut UiState) -> R + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move |ui| {
            let _ = done_tx.send(f(ui));
        });
        if self.tx.send(Command::Exec(job)).is_err() {
            return None;
        }
        Some(done_rx)
    }

    fn gone<R>(&self) -> Result<Option<R>, TableError> {
        if self.closing.load(Ordering::Acquire) {
            tracing::debug!("UI thread is gone; submission dropped");
            Ok(None)
        } else {
            tracing::error!("UI thread died without shutting down");
            Err(TableError::UiThreadPanicked)
        }
    }
}

#[derive(Debug)]
pub struct UiThread {
    handle: UiHandle,
    join: JoinHandle<Option<UiState>>,
}

impl UiThread {
    /// Start the UI thread. Column sets published on `fetchers` after this
    /// call rebuild the table.
    pub fn spawn(state: UiState, fetchers: watch::Receiver<Vec<Fetcher>>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let closing = Arc::new(AtomicBool::new(false));
        let loop_closing = closing.clone();
        let join = thread::Builder::new()
            .name("scan-table-ui".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        loop_closing.store(true, Ordering::Release);
                        tracing::error!("failed to start UI runtime: {e}");
                        return None;
                    }
                };
                Some(rt.block_on(run_loop(state, rx, fetchers, loop_closing)))
            })?;
        Ok(Self {
            handle: UiHandle { tx, closing },
            join,
        })
    }

    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// Stop the loop after already queued work, dispose the table and hand
    /// back the final state.
    pub fn shutdown(self) -> Option<UiState> {
        self.handle.closing.store(true, Ordering::Release);
        let _ = self.handle.tx.send(Command::Shutdown);
        match self.join.join() {
            Ok(state) => state,
            Err(_) => {
                tracing::error!("UI thread panicked");
                None
            }
        }
    }
}

async fn run_loop(
    mut state: UiState,
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut fetchers: watch::Receiver<Vec<Fetcher>>,
    closing: Arc<AtomicBool>,
) -> UiState {
    let mut watching = true;
    loop {
        tokio::select! {
            biased;
            cmd = rx.recv() => match cmd {
                Some(Command::Exec(job)) => job(&mut state),
                Some(Command::Shutdown) | None => break,
            },
            changed = fetchers.changed(), if watching => match changed {
                Ok(()) => {
                    let selected = fetchers.borrow_and_update().clone();
                    state.rebuild_columns(selected);
                }
                Err(_) => watching = false,
            },
        }
    }
    closing.store(true, Ordering::Release);
    state.table.dispose();
    tracing::debug!(rows = state.table.row_count(), "UI loop finished");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::{builtin_fetchers, FetcherRegistry, IP};
    use std::net::{IpAddr, Ipv4Addr};

    fn start(registry: &FetcherRegistry) -> UiThread {
        let dims = DimensionsConfig::default();
        let table = ResultTable::new(registry.selected(), &dims);
        UiThread::spawn(UiState::new(table, dims), registry.subscribe()).unwrap()
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 9, 8, last))
    }

    #[test]
    fn blocking_producers_rendezvous() {
        let registry = FetcherRegistry::default();
        let ui = start(&registry);
        let workers: Vec<_> = (1..=8u8)
            .map(|i| {
                let h = ui.handle();
                thread::spawn(move || {
                    let change = h.add_or_update_blocking(ScanResult::new(ip(i), 4)).unwrap();
                    // already visible once the call returns
                    let seen = h
                        .exec_blocking(move |ui| ui.table.scanning_results().index_of(ip(i)))
                        .unwrap()
                        .flatten();
                    (change, seen)
                })
            })
            .collect();
        for w in workers {
            let (change, seen) = w.join().unwrap();
            assert!(matches!(change, RowChange::Added(_)));
            assert!(seen.is_some());
        }
        let state = ui.shutdown().unwrap();
        assert_eq!(state.table.row_count(), 8);
        assert!(state.table.is_disposed());
    }

    #[test]
    fn submissions_after_shutdown_are_ignored() {
        let registry = FetcherRegistry::default();
        let ui = start(&registry);
        let h = ui.handle();
        ui.shutdown();
        assert_eq!(
            h.add_or_update_blocking(ScanResult::new(ip(1), 4)).unwrap(),
            RowChange::Ignored
        );
        assert!(h.exec_blocking(|ui| ui.table.row_count()).unwrap().is_none());
    }

    #[test]
    fn panicked_ui_thread_is_not_a_shutdown() {
        let registry = FetcherRegistry::default();
        let ui = start(&registry);
        let h = ui.handle();
        let crashed = h.exec_blocking(|ui| {
            ui.table.render_row(99);
        });
        assert!(matches!(crashed, Err(TableError::UiThreadPanicked)));
        assert!(matches!(
            h.add_or_update_blocking(ScanResult::new(ip(1), 4)),
            Err(TableError::UiThreadPanicked)
        ));
        assert!(ui.shutdown().is_none());
    }

    #[test]
    fn registry_change_rebuilds_columns() {
        let registry = FetcherRegistry::new(builtin_fetchers());
        let ui = start(&registry);
        let h = ui.handle();
        h.add_or_update_blocking(ScanResult::new(ip(1), 4)).unwrap();
        registry.select(&[IP]).unwrap();
        // the rebuild is picked up on a later loop turn
        let mut cols = 0;
        for _ in 0..100 {
            cols = h.exec_blocking(|ui| ui.table.columns().len()).unwrap().unwrap();
            if cols == 1 {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(cols, 1);
        let rows = h.exec_blocking(|ui| ui.table.row_count()).unwrap().unwrap();
        assert_eq!(rows, 0);
        ui.shutdown();
    }
}
