//! Progress rollups for empréstito-funded public-works contracts.
//!
//! Contracts and their progress reports go in; value-weighted progress by
//! bank, managing center, sector and ISO week comes out. Everything past the
//! loader is a pure function of the in-memory [`types::Snapshot`].
pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod output;
pub mod reports;
pub mod resolver;
pub mod types;
pub mod util;
pub mod weekly;

pub use aggregate::{aggregate, aggregate_with, WeightedAggregate};
pub use error::{DataIssue, LoadError};
pub use filter::{FilterConfig, FilterDimension};
pub use reports::{PortfolioSummary, Rollup};
pub use resolver::{resolve_latest, ReportIndex, ReportWindow};
pub use types::{Contract, ProgressReport, Snapshot};
pub use weekly::{build_weekly_series, weekly_variation, WeekAxis, WeekBucket, WeekKey, WeeklyVariation};
