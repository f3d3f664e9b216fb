//! Concrete adapters for the `sig-ports` traits: SQLite write-back,
//! the report row projection, and the delimited site/country lookup.

pub mod report;
pub mod site_lookup;
pub mod sqlite_sink;

pub use report::RowReportSink;
pub use site_lookup::DelimitedSiteLookup;
pub use sqlite_sink::SqliteSigningSink;
