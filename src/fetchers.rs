//! Fetcher descriptors and the registry of currently selected fetchers.
//!
//! A fetcher produces one column of data per scanned address. The table only
//! cares about their order and labels; the selection is broadcast over a
//! `watch` channel so the UI thread can rebuild its columns when it changes.

use crate::error::TableError;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fetcher {
    pub id: String,
    pub label: String,
}

impl Fetcher {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

pub const IP: &str = "ip";
pub const PING: &str = "ping";
pub const PORTS: &str = "ports";
pub const OPEN_COUNT: &str = "open.count";

/// Fetchers the bundled scanner knows how to fill.
pub fn builtin_fetchers() -> Vec<Fetcher> {
    vec![
        Fetcher::new(IP, "IP"),
        Fetcher::new(PING, "Ping"),
        Fetcher::new(PORTS, "Ports"),
        Fetcher::new(OPEN_COUNT, "Open"),
    ]
}

#[derive(Debug)]
pub struct FetcherRegistry {
    available: Vec<Fetcher>,
    selected: watch::Sender<Vec<Fetcher>>,
}

impl FetcherRegistry {
    /// Registry over `available`, with all of them selected.
    pub fn new(available: Vec<Fetcher>) -> Self {
        let (selected, _) = watch::channel(available.clone());
        Self { available, selected }
    }

    pub fn selected(&self) -> Vec<Fetcher> {
        self.selected.borrow().clone()
    }

    /// Replace the selection with the fetchers named by `ids`, in that order.
    ///
    /// Subscribers are notified even if the new selection equals the old one.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), TableError> {
        if ids.is_empty() {
            return Err(TableError::NoFetchers);
        }
        let mut picked = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let fetcher = self
                .available
                .iter()
                .find(|f| f.id == id)
                .ok_or_else(|| TableError::UnknownFetcher(id.to_string()))?;
            picked.push(fetcher.clone());
        }
        tracing::debug!(count = picked.len(), "fetcher selection changed");
        self.selected.send_replace(picked);
        Ok(())
    }

    /// Receiver that observes every later call to [`select`](Self::select).
    pub fn subscribe(&self) -> watch::Receiver<Vec<Fetcher>> {
        self.selected.subscribe()
    }
}

impl Default for FetcherRegistry {
    fn default() -> Self {
        Self::new(builtin_fetchers())
    }
}
