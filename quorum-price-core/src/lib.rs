//! Real-time multi-exchange reference-price aggregation engine.
//!
//! Each supported asset is served by a fleet of per-venue [`feed::FeedRunner`]
//! tasks that stream ticker data into shared [`feed::FeedState`] slots; the
//! [`aggregator`] reduces those into a median [`report::PriceReport`] on
//! every update. [`facade::Feed`] is the entry point most callers want.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod facade;
pub mod feed;
pub mod oracle;
pub mod registry;
pub mod report;
pub mod snapshot;

pub use config::Config;
pub use error::DataError;
pub use facade::{Feed, FeedStats};
pub use oracle::{OracleDirection, OracleSignal};
pub use report::PriceReport;
pub use snapshot::{Asset, QuoteUnit, Snapshot, VenueId};
