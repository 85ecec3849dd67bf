//! Routing of UI signals on the result table to external actions.
//!
//! The router owns no logic of its own beyond gating: it decides which
//! [`TableActions`] callback a signal maps to and whether the platform's
//! default handling should still run.

use crate::config::DimensionsConfig;
use crate::fetchers::Fetcher;
use crate::view::ResultTable;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Return,
    Tab,
    Delete,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false }
    }

    pub fn ctrl(key: Key) -> Self {
        Self { key, ctrl: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Selection(Vec<usize>),
    DoubleClick,
    Traverse(Key),
    KeyDown(KeyPress),
    ColumnClick(usize),
    ColumnResize { column: usize, width: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// Whether the platform default for this event should still run.
    pub doit: bool,
}

impl EventOutcome {
    const PASS: Self = Self { doit: true };
    const CONSUMED: Self = Self { doit: false };
}

/// Coarse state of the external scanner, as far as table actions care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Starting,
    Scanning,
    Stopping,
}

impl ScanState {
    /// Rows may only be deleted while no scan is feeding the table.
    pub fn allows_delete(self) -> bool {
        self == ScanState::Idle
    }
}

/// Handlers the router dispatches to. All default to doing nothing.
pub trait TableActions {
    fn selection_changed(&mut self, _selection: &[usize]) {}
    fn show_details(&mut self, _details: &str) {}
    fn rows_deleted(&mut self, _indices: &[usize]) {}
    fn copy_address(&mut self, _address: IpAddr) {}
    fn column_clicked(&mut self, _fetcher: &Fetcher) {}
    fn column_resized(&mut self, _label: &str, _width: u32) {}
}

/// Writes resized column widths back into a [`DimensionsConfig`].
#[derive(Debug)]
pub struct PersistWidths<'a>(pub &'a mut DimensionsConfig);

impl TableActions for PersistWidths<'_> {
    fn column_resized(&mut self, label: &str, width: u32) {
        self.0.set_column_width(label, width);
    }
}

#[derive(Debug, Default)]
pub struct EventRouter;

impl EventRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch<A: TableActions + ?Sized>(
        &self,
        event: UiEvent,
        table: &mut ResultTable,
        state: ScanState,
        actions: &mut A,
    ) -> EventOutcome {
        if table.is_disposed() {
            return EventOutcome::PASS;
        }
        match event {
            UiEvent::Selection(indices) => {
                table.set_selection(&indices);
                actions.selection_changed(&table.selection());
                EventOutcome::PASS
            }
            UiEvent::DoubleClick | UiEvent::Traverse(Key::Return) => {
                match table.selected_details() {
                    Some(details) => {
                        actions.show_details(&details);
                        EventOutcome::CONSUMED
                    }
                    None => EventOutcome::PASS,
                }
            }
            UiEvent::Traverse(_) => EventOutcome::PASS,
            UiEvent::KeyDown(KeyPress { key: Key::Delete, ctrl: false }) => {
                if !state.allows_delete() {
                    tracing::debug!(?state, "delete ignored while scanning");
                    return EventOutcome::PASS;
                }
                let selected = table.selection();
                if selected.is_empty() {
                    return EventOutcome::PASS;
                }
                table.remove(&selected);
                actions.rows_deleted(&selected);
                EventOutcome::CONSUMED
            }
            UiEvent::KeyDown(KeyPress { key: Key::Char('c'), ctrl: true }) => {
                match table.selected_address() {
                    Some(address) => {
                        actions.copy_address(address);
                        EventOutcome::CONSUMED
                    }
                    None => EventOutcome::PASS,
                }
            }
            UiEvent::KeyDown(_) => EventOutcome::PASS,
            UiEvent::ColumnClick(column) => {
                if let Some(c) = table.columns().get(column) {
                    actions.column_clicked(&c.fetcher);
                }
                EventOutcome::PASS
            }
            UiEvent::ColumnResize { column, width } => {
                table.set_column_width(column, width);
                if let Some(c) = table.columns().get(column) {
                    actions.column_resized(c.label(), width);
                }
                EventOutcome::PASS
            }
        }
    }
}
