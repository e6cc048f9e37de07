// src/compliance.rs
use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::calendar::{last_completed_saturday, CalendarBasis, DateInput, DateRange};
use crate::error::ComplianceError;

// --- Policy Defaults ---

pub const DEFAULT_NUM_WEEKS: u32 = 12;
pub const DEFAULT_EXCLUDED_WEEKS: u32 = 4;
pub const DEFAULT_REQUIRED_INCLUDED_DAYS: u32 = 24;

/// Longest alignment period accepted from configuration or the command line.
pub const MAX_NUM_WEEKS: u32 = 520;

const DAYS_PER_WEEK: u64 = 7;

// --- Policy ---

/// Office-attendance policy parameters.
///
/// `required_included_days` is independent of the window size;
/// changing `num_weeks` or `excluded_weeks` does not rescale it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendancePolicy {
    pub num_weeks: u32,
    pub excluded_weeks: u32,
    pub required_included_days: u32,
}

impl AttendancePolicy {
    pub fn new(num_weeks: u32, excluded_weeks: u32, required_included_days: u32) -> Self {
        Self {
            num_weeks,
            excluded_weeks,
            required_included_days,
        }
    }

    /// Window length actually used. A zero-week policy falls back to the default window.
    pub fn effective_num_weeks(&self) -> u32 {
        if self.num_weeks == 0 {
            DEFAULT_NUM_WEEKS
        } else {
            self.num_weeks
        }
    }

    /// Excluded weeks actually used; never more than the window holds.
    pub fn effective_excluded_weeks(&self) -> u32 {
        self.excluded_weeks.min(self.effective_num_weeks())
    }

    pub fn included_week_count(&self) -> u32 {
        self.effective_num_weeks() - self.effective_excluded_weeks()
    }
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_NUM_WEEKS,
            DEFAULT_EXCLUDED_WEEKS,
            DEFAULT_REQUIRED_INCLUDED_DAYS,
        )
    }
}

// --- Result Structures ---

/// One Sunday-to-Saturday span of the alignment period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub index: usize,
    pub range: DateRange,
    pub attended_days: u32,
    pub excluded: bool,
}

/// How the attendance input was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceTally {
    pub records_received: usize,
    pub malformed_records: usize,
    pub unique_days: usize,
    pub days_in_period: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceResult {
    pub calculation_date: NaiveDate,
    pub period: DateRange,
    pub is_compliant: bool,
    /// Non-excluded weeks, chronological.
    pub included_weeks: Vec<DateRange>,
    /// Excluded weeks, chronological.
    pub excluded_weeks: Vec<DateRange>,
    pub weeks: Vec<WeekBucket>,
    pub total_included_days: u32,
    pub required_included_days: u32,
    /// Unique attendance days inside the period, chronological.
    pub attended_days: Vec<NaiveDate>,
    pub tally: AttendanceTally,
}

impl ComplianceResult {
    /// Days still missing to reach the threshold; zero when compliant.
    pub fn shortfall(&self) -> u32 {
        self.required_included_days
            .saturating_sub(self.total_included_days)
    }

    pub fn average_days_per_included_week(&self) -> Decimal {
        let mut average = if self.included_weeks.is_empty() {
            dec!(0)
        } else {
            (Decimal::from(self.total_included_days) / Decimal::from(self.included_weeks.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        average.rescale(2);
        average
    }
}

impl fmt::Display for ComplianceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Alignment period: {} ({} weeks, calculated on {})",
            self.period,
            self.weeks.len(),
            self.calculation_date
        )?;
        for week in &self.weeks {
            write!(
                f,
                "  Week {:>2}  {}  {} day{}",
                week.index + 1,
                week.range,
                week.attended_days,
                if week.attended_days == 1 { "" } else { "s" }
            )?;
            if week.excluded {
                write!(f, "  (excluded)")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "Included days: {} of {} required (avg {} per included week)",
            self.total_included_days,
            self.required_included_days,
            self.average_days_per_included_week()
        )?;
        if self.is_compliant {
            writeln!(f, "Verdict: compliant")
        } else {
            writeln!(f, "Verdict: NOT compliant ({} days short)", self.shortfall())
        }
    }
}

// --- Evaluator ---

/// Stateless compliance calculator. Cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplianceEvaluator {
    policy: AttendancePolicy,
    basis: CalendarBasis,
}

impl ComplianceEvaluator {
    pub fn new(policy: AttendancePolicy, basis: CalendarBasis) -> Self {
        Self { policy, basis }
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    pub fn basis(&self) -> &CalendarBasis {
        &self.basis
    }

    /// Evaluates attendance against the policy for the alignment period that
    /// ends on the last completed Saturday before `calculation_date`.
    ///
    /// Fails only when `calculation_date` is missing or not a real calendar
    /// date. Malformed attendance records are skipped.
    pub fn evaluate<D, I>(
        &self,
        calculation_date: D,
        attendance: I,
    ) -> Result<ComplianceResult, ComplianceError>
    where
        D: Into<DateInput>,
        I: IntoIterator,
        I::Item: Into<DateInput>,
    {
        let calculation_date = self.normalize_calculation_date(calculation_date.into())?;
        let num_weeks = self.policy.effective_num_weeks();
        let period = alignment_period(calculation_date, num_weeks)?;
        let mut weeks = partition_weeks(&period, num_weeks)?;

        let mut tally = AttendanceTally::default();
        let mut unique_days = BTreeSet::new();
        for record in attendance {
            tally.records_received += 1;
            let input: DateInput = record.into();
            match input.to_calendar_date(&self.basis) {
                Some(day) => {
                    unique_days.insert(day);
                }
                None => tally.malformed_records += 1,
            }
        }
        tally.unique_days = unique_days.len();

        let attended_days: Vec<NaiveDate> = unique_days
            .range(period.start()..=period.end())
            .copied()
            .collect();
        tally.days_in_period = attended_days.len();

        for day in &attended_days {
            let elapsed = (*day - period.start()).num_days();
            // Out-of-range indices are ignored
            if let Ok(index) = usize::try_from(elapsed / DAYS_PER_WEEK as i64) {
                if let Some(week) = weeks.get_mut(index) {
                    week.attended_days += 1;
                }
            }
        }

        mark_excluded_weeks(&mut weeks, self.policy.effective_excluded_weeks() as usize);

        let included_weeks: Vec<DateRange> = weeks
            .iter()
            .filter(|w| !w.excluded)
            .map(|w| w.range)
            .collect();
        let excluded_weeks: Vec<DateRange> = weeks
            .iter()
            .filter(|w| w.excluded)
            .map(|w| w.range)
            .collect();
        let total_included_days: u32 = weeks
            .iter()
            .filter(|w| !w.excluded)
            .map(|w| w.attended_days)
            .sum();

        Ok(ComplianceResult {
            calculation_date,
            period,
            is_compliant: total_included_days >= self.policy.required_included_days,
            included_weeks,
            excluded_weeks,
            weeks,
            total_included_days,
            required_included_days: self.policy.required_included_days,
            attended_days,
            tally,
        })
    }

    fn normalize_calculation_date(&self, input: DateInput) -> Result<NaiveDate, ComplianceError> {
        if input.is_missing() {
            return Err(ComplianceError::InvalidInput(
                "calculation date is missing".to_string(),
            ));
        }
        input.to_calendar_date(&self.basis).ok_or_else(|| {
            ComplianceError::InvalidInput(format!(
                "calculation date {} is not a valid calendar date",
                input
            ))
        })
    }
}

/// Evaluates with the default policy and a UTC calendar basis, overriding
/// only the window length.
pub fn evaluate<D, I>(
    calculation_date: D,
    attendance: I,
    num_weeks: u32,
) -> Result<ComplianceResult, ComplianceError>
where
    D: Into<DateInput>,
    I: IntoIterator,
    I::Item: Into<DateInput>,
{
    let policy = AttendancePolicy {
        num_weeks,
        ..AttendancePolicy::default()
    };
    ComplianceEvaluator::new(policy, CalendarBasis::utc()).evaluate(calculation_date, attendance)
}

// --- Window Construction ---

/// The `num_weeks` complete weeks ending on the last completed Saturday.
pub fn alignment_period(
    calculation_date: NaiveDate,
    num_weeks: u32,
) -> Result<DateRange, ComplianceError> {
    let out_of_range = || {
        ComplianceError::InvalidInput(format!(
            "calculation date {} is too close to the calendar limits for a {}-week period",
            calculation_date, num_weeks
        ))
    };

    let end = last_completed_saturday(calculation_date).ok_or_else(out_of_range)?;
    let span = u64::from(num_weeks) * DAYS_PER_WEEK;
    let start = end
        .checked_sub_days(Days::new(span.saturating_sub(1)))
        .ok_or_else(out_of_range)?;
    DateRange::new(start, end)
}

fn partition_weeks(
    period: &DateRange,
    num_weeks: u32,
) -> Result<Vec<WeekBucket>, ComplianceError> {
    (0..num_weeks as usize)
        .map(|index| -> Result<WeekBucket, ComplianceError> {
            let offset = Days::new(index as u64 * DAYS_PER_WEEK);
            let range = period
                .start()
                .checked_add_days(offset)
                .and_then(|start| DateRange::from_start(start, DAYS_PER_WEEK))
                .ok_or_else(|| {
                    ComplianceError::InvalidInput(format!(
                        "week {} of period {} exceeds the calendar limits",
                        index + 1,
                        period
                    ))
                })?;
            Ok(WeekBucket {
                index,
                range,
                attended_days: 0,
                excluded: false,
            })
        })
        .collect()
}

// --- Exclusion ---

/// Flags the `excluded` worst weeks. Worst means fewest attended days; among
/// equal counts the earlier week is excluded first.
fn mark_excluded_weeks(weeks: &mut [WeekBucket], excluded: usize) {
    let mut ranked: Vec<usize> = (0..weeks.len()).collect();
    ranked.sort_by_key(|&i| (weeks[i].attended_days, weeks[i].range.start()));
    for &i in ranked.iter().take(excluded) {
        weeks[i].excluded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn bucket(index: usize, start: &str, attended_days: u32) -> WeekBucket {
        WeekBucket {
            index,
            range: DateRange::from_start(d(start), 7).unwrap(),
            attended_days,
            excluded: false,
        }
    }

    #[test]
    fn alignment_period_spans_complete_weeks() {
        let period = alignment_period(d("2025-04-16"), 12).unwrap();
        assert_eq!(period.start(), d("2025-01-19"));
        assert_eq!(period.end(), d("2025-04-12"));
        assert_eq!(period.start().weekday(), Weekday::Sun);
        assert_eq!(period.end().weekday(), Weekday::Sat);
        assert_eq!(period.num_days(), 84);
    }

    #[test]
    fn alignment_period_single_week() {
        let period = alignment_period(d("2025-04-16"), 1).unwrap();
        assert_eq!(period.start(), d("2025-04-06"));
        assert_eq!(period.end(), d("2025-04-12"));
    }

    #[test]
    fn alignment_period_rejects_calendar_limits() {
        let err = alignment_period(NaiveDate::MIN, 12).unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidInput(_)));
    }

    #[test]
    fn partition_covers_period_without_gaps() {
        let period = alignment_period(d("2025-04-16"), 12).unwrap();
        let weeks = partition_weeks(&period, 12).unwrap();
        assert_eq!(weeks.len(), 12);
        assert_eq!(weeks[0].range.start(), period.start());
        assert_eq!(weeks[11].range.end(), period.end());
        for pair in weeks.windows(2) {
            assert_eq!(pair[0].range.end().succ_opt(), Some(pair[1].range.start()));
        }
    }

    #[test]
    fn exclusion_prefers_lowest_counts_then_earliest_weeks() {
        let mut weeks = vec![
            bucket(0, "2025-01-05", 2),
            bucket(1, "2025-01-12", 1),
            bucket(2, "2025-01-19", 2),
            bucket(3, "2025-01-26", 0),
            bucket(4, "2025-02-02", 2),
            bucket(5, "2025-02-09", 3),
        ];
        mark_excluded_weeks(&mut weeks, 3);

        let excluded: Vec<usize> = weeks.iter().filter(|w| w.excluded).map(|w| w.index).collect();
        assert_eq!(excluded, vec![0, 1, 3]);
    }

    #[test]
    fn exclusion_larger_than_window_excludes_everything() {
        let mut weeks = vec![bucket(0, "2025-01-05", 2), bucket(1, "2025-01-12", 1)];
        mark_excluded_weeks(&mut weeks, 10);
        assert!(weeks.iter().all(|w| w.excluded));
    }

    #[test]
    fn policy_effective_values_degrade_gracefully() {
        let zero_weeks = AttendancePolicy::new(0, 4, 24);
        assert_eq!(zero_weeks.effective_num_weeks(), DEFAULT_NUM_WEEKS);
        assert_eq!(zero_weeks.included_week_count(), 8);

        let over_excluded = AttendancePolicy::new(3, 5, 1);
        assert_eq!(over_excluded.effective_excluded_weeks(), 3);
        assert_eq!(over_excluded.included_week_count(), 0);
    }

    #[test]
    fn average_per_included_week_rounds_to_two_places() {
        let result = ComplianceEvaluator::default()
            .evaluate(
                d("2025-04-16"),
                ["2025-04-07", "2025-04-08", "2025-03-31", "2025-03-24", "2025-03-25"],
            )
            .unwrap();
        assert_eq!(result.total_included_days, 5);
        assert_eq!(result.average_days_per_included_week(), dec!(0.63));
    }
}
