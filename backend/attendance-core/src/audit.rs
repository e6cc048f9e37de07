// src/audit.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::compliance::ComplianceResult;

/// Structured record of one compliance evaluation.
///
/// The evaluator stays free of side effects; callers build this from the
/// result and decide where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub calculation_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub num_weeks: usize,
    pub excluded_weeks: usize,
    pub required_included_days: u32,
    pub total_included_days: u32,
    pub average_days_per_included_week: Decimal,
    pub is_compliant: bool,
    pub records_received: usize,
    pub malformed_records: usize,
    pub unique_days: usize,
    pub days_in_period: usize,
    /// SHA-256 over the in-period attendance days, hex encoded.
    pub attendance_fingerprint: String,
}

impl AuditRecord {
    pub fn from_result(result: &ComplianceResult) -> Self {
        Self {
            calculation_date: result.calculation_date,
            period_start: result.period.start(),
            period_end: result.period.end(),
            num_weeks: result.weeks.len(),
            excluded_weeks: result.excluded_weeks.len(),
            required_included_days: result.required_included_days,
            total_included_days: result.total_included_days,
            average_days_per_included_week: result.average_days_per_included_week(),
            is_compliant: result.is_compliant,
            records_received: result.tally.records_received,
            malformed_records: result.tally.malformed_records,
            unique_days: result.tally.unique_days,
            days_in_period: result.tally.days_in_period,
            attendance_fingerprint: fingerprint(&result.attended_days),
        }
    }

    pub fn emit(&self) {
        info!(
            target: "attendance::audit",
            calculation_date = %self.calculation_date,
            period_start = %self.period_start,
            period_end = %self.period_end,
            num_weeks = self.num_weeks,
            excluded_weeks = self.excluded_weeks,
            required_included_days = self.required_included_days,
            total_included_days = self.total_included_days,
            is_compliant = self.is_compliant,
            records_received = self.records_received,
            malformed_records = self.malformed_records,
            unique_days = self.unique_days,
            days_in_period = self.days_in_period,
            fingerprint = %self.attendance_fingerprint,
            "Attendance compliance evaluated"
        );
    }
}

fn fingerprint(days: &[NaiveDate]) -> String {
    let mut hasher = Sha256::new();
    for day in days {
        hasher.update(day.format("%Y-%m-%d\n").to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}
