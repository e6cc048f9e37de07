// src/lib.rs
//! Office-attendance compliance over a rolling window of completed weeks.
//!
//! [`ComplianceEvaluator::evaluate`] takes a calculation date and a noisy set
//! of attendance dates and reports whether the included weeks reach the
//! policy threshold after dropping the worst weeks.

pub mod audit;
pub mod calendar;
pub mod compliance;
pub mod config;
pub mod error;
pub mod feed;


pub use audit::AuditRecord;
pub use calendar::{CalendarBasis, DateInput, DateRange};
pub use compliance::{
    evaluate, AttendancePolicy, AttendanceTally, ComplianceEvaluator, ComplianceResult,
    WeekBucket, MAX_NUM_WEEKS,
};
pub use config::AppConfig;
pub use error::{ComplianceError, ConfigError, FeedError};
