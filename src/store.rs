//! Authoritative, positionally indexed store of scan results.
//!
//! Rows of the table view are indices into this store. An index stays valid
//! until an explicit [`ResultStore::remove`] or [`ResultStore::clear`]; the
//! address map is what makes re-submission of a known address an update
//! rather than a second row.

use crate::error::TableError;
use crate::fetchers::Fetcher;
use crate::types::ScanResult;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::io::Write;
use std::net::IpAddr;

#[derive(Debug, Default)]
pub struct ResultStore {
    fetchers: Vec<Fetcher>,
    results: Vec<ScanResult>,
    index: HashMap<IpAddr, usize>,
}

impl ResultStore {
    pub fn new(fetchers: Vec<Fetcher>) -> Self {
        Self {
            fetchers,
            ..Self::default()
        }
    }

    pub fn fetchers(&self) -> &[Fetcher] {
        &self.fetchers
    }

    pub fn column_count(&self) -> usize {
        self.fetchers.len()
    }

    /// Install a new column set. All results are dropped, since their values
    /// are laid out for the old one.
    pub fn replace_fetchers(&mut self, fetchers: Vec<Fetcher>) {
        self.clear();
        self.fetchers = fetchers;
    }

    /// Reject results whose value count does not match the column set.
    pub fn check_layout(&self, result: &ScanResult) -> Result<(), TableError> {
        let found = result.values().len();
        if found != self.column_count() {
            return Err(TableError::ColumnMismatch {
                address: result.address(),
                expected: self.column_count(),
                found,
            });
        }
        Ok(())
    }

    pub fn is_registered(&self, result: &ScanResult) -> bool {
        self.index.contains_key(&result.address())
    }

    pub fn index_of(&self, address: IpAddr) -> Option<usize> {
        self.index.get(&address).copied()
    }

    /// Overwrite the stored entry with the same address, returning its index.
    pub fn update(&mut self, result: ScanResult) -> usize {
        let Some(&index) = self.index.get(&result.address()) else {
            panic!("update of unregistered address {}", result.address());
        };
        self.assert_layout(&result);
        self.results[index] = result;
        index
    }

    /// Append `result` at `index`, which must be the current end of the store.
    pub fn register_at_index(&mut self, index: usize, result: ScanResult) {
        assert_eq!(
            index,
            self.results.len(),
            "results must be registered at the end of the store"
        );
        let address = result.address();
        assert!(
            !self.index.contains_key(&address),
            "address {address} is already registered"
        );
        self.assert_layout(&result);
        self.index.insert(address, index);
        self.results.push(result);
    }

    pub fn get_result(&self, index: usize) -> &ScanResult {
        match self.results.get(index) {
            Some(r) => r,
            None => panic!(
                "result index {index} out of bounds (store holds {})",
                self.results.len()
            ),
        }
    }

    pub fn get_result_mut(&mut self, index: usize) -> &mut ScanResult {
        let len = self.results.len();
        match self.results.get_mut(index) {
            Some(r) => r,
            None => panic!("result index {index} out of bounds (store holds {len})"),
        }
    }

    /// Remove the entries at `indices`. Survivors keep their relative order
    /// and are renumbered downwards.
    pub fn remove(&mut self, indices: &[usize]) {
        let doomed: BTreeSet<usize> = indices.iter().copied().collect();
        if doomed.is_empty() {
            return;
        }
        if let Some(&last) = doomed.iter().next_back() {
            assert!(
                last < self.results.len(),
                "remove index {last} out of bounds (store holds {})",
                self.results.len()
            );
        }
        let mut pos = 0usize;
        self.results.retain(|_| {
            let keep = !doomed.contains(&pos);
            pos += 1;
            keep
        });
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.results.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter()
    }

    /// Human-readable details of one row: a `label:\tvalue` line per column,
    /// then status and last update time.
    pub fn get_result_as_string(&self, index: usize) -> String {
        let result = self.get_result(index);
        let mut out = String::new();
        for (fetcher, value) in self.fetchers.iter().zip(result.values()) {
            let shown = value.as_ref().map(ToString::to_string).unwrap_or_default();
            let _ = writeln!(out, "{}:\t{}", fetcher.label, shown);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Status:\t{}", result.kind());
        let _ = writeln!(out, "Updated:\t{}", result.updated_at());
        out
    }

    /// Write every result as pretty JSON.
    pub fn export_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.results)?;
        Ok(())
    }

    fn assert_layout(&self, result: &ScanResult) {
        assert_eq!(
            result.values().len(),
            self.column_count(),
            "result for {} does not match the column layout",
            result.address()
        );
    }

    fn reindex(&mut self) {
        self.index = self
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.address(), i))
            .collect();
    }
}
