/// Errors surfaced by the result table to its callers.
///
/// Broken internal invariants (bad indices, row/store divergence) are not
/// represented here; those panic on the UI thread, and producers waiting on
/// it get [`TableError::UiThreadPanicked`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TableError {
    #[error("result for {address} has {found} values but the table has {expected} columns")]
    ColumnMismatch {
        address: std::net::IpAddr,
        expected: usize,
        found: usize,
    },

    #[error("unknown fetcher '{0}'")]
    UnknownFetcher(String),

    #[error("no fetchers selected")]
    NoFetchers,

    #[error("UI thread panicked; the result table is lost")]
    UiThreadPanicked,
}
