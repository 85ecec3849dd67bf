//! Lazily materialized table rows over a [`ResultStore`].
//!
//! Every row is either dirty (unmaterialized) or holds its rendered cells.
//! Rows are only rendered when the display pulls them through
//! [`ResultTable::render_row`]; mutations just mark rows dirty.

use crate::config::DimensionsConfig;
use crate::error::TableError;
use crate::fetchers::Fetcher;
use crate::store::ResultStore;
use crate::types::{ResultType, ScanResult};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Fixed status→icon resource table.
#[derive(Debug, Clone)]
pub struct StatusIcons([&'static str; 4]);

impl StatusIcons {
    pub fn icon(&self, kind: ResultType) -> &'static str {
        self.0[kind.ordinal()]
    }
}

impl Default for StatusIcons {
    fn default() -> Self {
        let mut icons = [""; 4];
        icons[ResultType::Unknown.ordinal()] = "list.unknown";
        icons[ResultType::Dead.ordinal()] = "list.dead";
        icons[ResultType::Alive.ordinal()] = "list.alive";
        icons[ResultType::WithPorts.ordinal()] = "list.addinfo";
        Self(icons)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub fetcher: Fetcher,
    pub width: u32,
}

impl Column {
    pub fn label(&self) -> &str {
        &self.fetcher.label
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub icon: &'static str,
    pub cells: Vec<String>,
}

/// What [`ResultTable::add_or_update`] did with a submitted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Added(usize),
    Updated(usize),
    /// The view was already disposed.
    Ignored,
}

#[derive(Debug)]
pub struct ResultTable {
    store: ResultStore,
    columns: Vec<Column>,
    rows: Vec<Option<RenderedRow>>,
    selection: BTreeSet<usize>,
    icons: StatusIcons,
    disposed: bool,
    renders: u64,
}

impl ResultTable {
    pub fn new(fetchers: Vec<Fetcher>, dimensions: &DimensionsConfig) -> Self {
        let mut table = Self {
            store: ResultStore::default(),
            columns: Vec::new(),
            rows: Vec::new(),
            selection: BTreeSet::new(),
            icons: StatusIcons::default(),
            disposed: false,
            renders: 0,
        };
        table.rebuild_columns(fetchers, dimensions);
        table
    }

    /// Read access to the backing store.
    pub fn scanning_results(&self) -> &ResultStore {
        &self.store
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_materialized(&self, index: usize) -> bool {
        self.rows.get(index).is_some_and(Option::is_some)
    }

    /// Number of row renders performed so far.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tear the view down. Every later mutation is a no-op.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    /// Record `result`: update in place if its address is known, otherwise
    /// append a new row at the end.
    pub fn add_or_update(&mut self, result: ScanResult) -> Result<RowChange, TableError> {
        if self.disposed {
            tracing::debug!(address = %result.address(), "result for disposed table dropped");
            return Ok(RowChange::Ignored);
        }
        self.store.check_layout(&result)?;
        if self.store.is_registered(&result) {
            let index = self.store.update(result);
            self.rows[index] = None;
            Ok(RowChange::Updated(index))
        } else {
            // register first so the new row can always be rendered
            let index = self.rows.len();
            self.store.register_at_index(index, result);
            self.rows.push(None);
            self.assert_in_sync();
            Ok(RowChange::Added(index))
        }
    }

    /// Materialize row `index` if dirty and return it.
    pub fn render_row(&mut self, index: usize) -> &RenderedRow {
        assert!(
            index < self.rows.len(),
            "row {index} out of bounds ({} rows)",
            self.rows.len()
        );
        if self.rows[index].is_none() {
            let rendered = self.render(index);
            self.renders += 1;
            self.rows[index] = Some(rendered);
        }
        match &self.rows[index] {
            Some(row) => row,
            None => unreachable!("row {index} was just materialized"),
        }
    }

    /// Render the rows in `start..start+count` that are on screen.
    pub fn render_window(&mut self, start: usize, count: usize) -> Vec<RenderedRow> {
        let end = start.saturating_add(count).min(self.rows.len());
        (start..end).map(|i| self.render_row(i).clone()).collect()
    }

    pub fn invalidate(&mut self, indices: &[usize]) {
        if self.disposed {
            return;
        }
        for &i in indices {
            assert!(i < self.rows.len(), "row {i} out of bounds ({} rows)", self.rows.len());
            self.rows[i] = None;
        }
    }

    /// Mark every row dirty.
    pub fn invalidate_all(&mut self) {
        if self.disposed {
            return;
        }
        self.rows.iter_mut().for_each(|r| *r = None);
    }

    /// Reset the results at `indices` as if just added and mark them dirty.
    pub fn reset_selected(&mut self, indices: &[usize]) {
        if self.disposed {
            return;
        }
        for &i in indices {
            self.store.get_result_mut(i).reset();
        }
        self.invalidate(indices);
    }

    pub fn reset_selection(&mut self) {
        let selected: Vec<usize> = self.selection.iter().copied().collect();
        self.reset_selected(&selected);
    }

    /// Drop all rows and results, then build one column per fetcher.
    pub fn rebuild_columns(&mut self, fetchers: Vec<Fetcher>, dimensions: &DimensionsConfig) {
        if self.disposed {
            return;
        }
        self.remove_all();
        self.columns = fetchers
            .iter()
            .map(|f| Column {
                width: dimensions.column_width(&f.label),
                fetcher: f.clone(),
            })
            .collect();
        self.store.replace_fetchers(fetchers);
        tracing::debug!(columns = self.columns.len(), "table columns rebuilt");
    }

    pub fn set_column_width(&mut self, column: usize, width: u32) {
        if let Some(c) = self.columns.get_mut(column) {
            c.width = width;
        }
    }

    /// Remove rows at `indices` from both the store and the view.
    pub fn remove(&mut self, indices: &[usize]) {
        if self.disposed {
            return;
        }
        let doomed: BTreeSet<usize> = indices.iter().copied().collect();
        self.store.remove(indices);
        let mut pos = 0usize;
        self.rows.retain(|_| {
            let keep = !doomed.contains(&pos);
            pos += 1;
            keep
        });
        self.selection = self
            .selection
            .iter()
            .copied()
            .filter(|i| !doomed.contains(i))
            .map(|i| i - doomed.range(..i).count())
            .collect();
        self.assert_in_sync();
    }

    pub fn remove_all(&mut self) {
        if self.disposed {
            return;
        }
        self.store.clear();
        self.rows.clear();
        self.selection.clear();
    }

    pub fn set_selection(&mut self, indices: &[usize]) {
        self.selection = indices
            .iter()
            .copied()
            .filter(|&i| i < self.rows.len())
            .collect();
    }

    pub fn selection(&self) -> Vec<usize> {
        self.selection.iter().copied().collect()
    }

    /// First selected row, if any.
    pub fn selection_index(&self) -> Option<usize> {
        self.selection.iter().next().copied()
    }

    pub fn selected_address(&self) -> Option<IpAddr> {
        self.selection_index()
            .map(|i| self.store.get_result(i).address())
    }

    /// Details text of the first selected row.
    pub fn selected_details(&self) -> Option<String> {
        self.selection_index()
            .map(|i| self.store.get_result_as_string(i))
    }

    fn render(&self, index: usize) -> RenderedRow {
        let result = self.store.get_result(index);
        let cells: Vec<String> = result
            .values()
            .iter()
            .map(|v| v.as_ref().map(ToString::to_string).unwrap_or_default())
            .collect();
        assert_eq!(
            cells.len(),
            self.columns.len(),
            "row {index} has {} cells for {} columns",
            cells.len(),
            self.columns.len()
        );
        RenderedRow {
            icon: self.icons.icon(result.kind()),
            cells,
        }
    }

    fn assert_in_sync(&self) {
        assert_eq!(
            self.rows.len(),
            self.store.len(),
            "row count diverged from result store"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::{builtin_fetchers, FetcherRegistry, IP, PORTS};
    use crate::types::CellValue;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn table() -> ResultTable {
        ResultTable::new(builtin_fetchers(), &DimensionsConfig::default())
    }

    fn alive(last: u8, ports: Vec<u16>) -> ScanResult {
        let kind = if ports.is_empty() { ResultType::Alive } else { ResultType::WithPorts };
        let count = ports.len() as u64;
        ScanResult::with_values(
            ip(last),
            kind,
            vec![
                Some(CellValue::Address(ip(last))),
                Some(CellValue::Millis(3)),
                Some(CellValue::Ports(ports)),
                Some(CellValue::Count(count)),
            ],
        )
    }

    #[test]
    fn rows_render_only_on_demand() {
        let mut t = table();
        for i in 1..=10 {
            t.add_or_update(alive(i, vec![])).unwrap();
        }
        assert_eq!(t.render_count(), 0);
        let window = t.render_window(2, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(t.render_count(), 3);
        assert!(t.is_materialized(2) && !t.is_materialized(5));
        t.render_row(2);
        assert_eq!(t.render_count(), 3);
    }

    #[test]
    fn absent_values_render_empty() {
        let mut t = table();
        t.add_or_update(ScanResult::new(ip(1), 4)).unwrap();
        let row = t.render_row(0);
        assert_eq!(row.cells, vec!["", "", "", ""]);
        assert_eq!(row.icon, "list.unknown");
    }

    #[test]
    fn update_dirties_only_its_row() {
        let mut t = table();
        t.add_or_update(alive(1, vec![])).unwrap();
        t.add_or_update(alive(2, vec![])).unwrap();
        t.render_window(0, 2);
        let change = t.add_or_update(alive(2, vec![22])).unwrap();
        assert_eq!(change, RowChange::Updated(1));
        assert!(t.is_materialized(0));
        assert!(!t.is_materialized(1));
        let row = t.render_row(1);
        assert_eq!(row.icon, "list.addinfo");
        assert_eq!(row.cells[2], "22");
    }

    #[test]
    fn reset_selection_clears_data() {
        let mut t = table();
        t.add_or_update(alive(1, vec![80])).unwrap();
        t.add_or_update(alive(2, vec![443])).unwrap();
        t.render_window(0, 2);
        t.set_selection(&[1]);
        t.reset_selection();
        let r = t.scanning_results().get_result(1);
        assert_eq!(r.kind(), ResultType::Unknown);
        assert_eq!(r.address(), ip(2));
        assert!(r.values().iter().all(Option::is_none));
        assert!(t.is_materialized(0));
        assert!(!t.is_materialized(1));
    }

    #[test]
    fn rebuild_clears_and_sizes_columns() {
        let mut dims = DimensionsConfig::default();
        dims.set_column_width("Ports", 250);
        let mut t = table();
        t.add_or_update(alive(1, vec![])).unwrap();
        let reg = FetcherRegistry::default();
        reg.select(&[IP, PORTS]).unwrap();
        t.rebuild_columns(reg.selected(), &dims);
        assert_eq!(t.row_count(), 0);
        assert!(t.scanning_results().is_empty());
        let widths: Vec<u32> = t.columns().iter().map(|c| c.width).collect();
        assert_eq!(widths, vec![dims.default_width, 250]);
        assert!(matches!(
            t.add_or_update(alive(1, vec![])),
            Err(TableError::ColumnMismatch { expected: 2, found: 4, .. })
        ));
        assert_eq!(t.row_count(), 0);
    }

    #[test]
    fn remove_renumbers_selection() {
        let mut t = table();
        for i in 1..=4 {
            t.add_or_update(alive(i, vec![])).unwrap();
        }
        t.set_selection(&[0, 2, 3]);
        t.remove(&[0, 1]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.selection(), vec![0, 1]);
        assert_eq!(t.selected_address(), Some(ip(3)));
    }

    #[test]
    fn disposed_table_ignores_mutations() {
        let mut t = table();
        t.add_or_update(alive(1, vec![])).unwrap();
        t.dispose();
        assert_eq!(t.add_or_update(alive(2, vec![])).unwrap(), RowChange::Ignored);
        t.remove_all();
        assert_eq!(t.row_count(), 1);
    }

    #[test]
    fn invalidate_all_forces_full_rerender() {
        let mut t = table();
        for i in 1..=4 {
            t.add_or_update(alive(i, vec![])).unwrap();
        }
        t.render_window(0, 4);
        assert_eq!(t.render_count(), 4);

        t.invalidate_all();
        assert!((0..4).all(|i| !t.is_materialized(i)));
        t.render_window(0, 4);
        assert_eq!(t.render_count(), 8);

        t.dispose();
        t.invalidate_all();
        assert!((0..4).all(|i| t.is_materialized(i)));
    }

    #[test]
    fn every_status_has_its_own_icon() {
        let icons = StatusIcons::default();
        let all: BTreeSet<&str> = ResultType::ALL.iter().map(|&k| icons.icon(k)).collect();
        assert_eq!(all.len(), ResultType::ALL.len());
        assert!(!all.contains(""));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn render_past_end_panics() {
        let mut t = table();
        t.render_row(0);
    }
}
