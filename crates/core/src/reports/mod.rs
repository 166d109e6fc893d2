//! Collection reports.
//!
//! - Children of a class grouped by participation
//! - Expected / collected / outstanding / available money per collection
//! - Class-wide totals

pub mod service;
pub mod types;


pub use service::{ReportEngine, ReportService};
pub use types::*;
