// src/config.rs
use serde::Deserialize;

use crate::calendar::CalendarBasis;
use crate::compliance::{
    AttendancePolicy, ComplianceEvaluator, DEFAULT_EXCLUDED_WEEKS, DEFAULT_NUM_WEEKS,
    DEFAULT_REQUIRED_INCLUDED_DAYS, MAX_NUM_WEEKS,
};
use crate::error::ConfigError;

/// Prefix of every environment variable read by [`AppConfig::from_env`].
pub const ENV_PREFIX: &str = "ATTENDANCE_";

// --- Application Configuration ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_num_weeks")]
    pub num_weeks: u32,
    #[serde(default = "default_excluded_weeks")]
    pub excluded_weeks: u32,
    #[serde(default = "default_required_included_days")]
    pub required_included_days: u32,
    #[serde(default)]
    pub utc_offset: CalendarBasis,
}

fn default_num_weeks() -> u32 {
    DEFAULT_NUM_WEEKS
}

fn default_excluded_weeks() -> u32 {
    DEFAULT_EXCLUDED_WEEKS
}

fn default_required_included_days() -> u32 {
    DEFAULT_REQUIRED_INCLUDED_DAYS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            num_weeks: DEFAULT_NUM_WEEKS,
            excluded_weeks: DEFAULT_EXCLUDED_WEEKS,
            required_included_days: DEFAULT_REQUIRED_INCLUDED_DAYS,
            utc_offset: CalendarBasis::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    /// Parses configuration from explicit `(name, value)` pairs, e.g. in tests.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        if config.num_weeks > MAX_NUM_WEEKS {
            return Err(ConfigError::NumWeeksTooLarge {
                value: config.num_weeks,
                max: MAX_NUM_WEEKS,
            });
        }
        Ok(config)
    }

    pub fn policy(&self) -> AttendancePolicy {
        AttendancePolicy::new(
            self.num_weeks,
            self.excluded_weeks,
            self.required_included_days,
        )
    }

    pub fn evaluator(&self) -> ComplianceEvaluator {
        ComplianceEvaluator::new(self.policy(), self.utc_offset)
    }

    /// Settings that are accepted but probably not what the operator meant.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let policy = self.policy();

        if self.num_weeks == 0 {
            warnings.push(format!(
                "num_weeks is 0; falling back to the default {}-week alignment period",
                DEFAULT_NUM_WEEKS
            ));
        }
        if self.excluded_weeks >= policy.effective_num_weeks() {
            warnings.push(format!(
                "excluded_weeks ({}) leaves no week of the {}-week period included",
                self.excluded_weeks,
                policy.effective_num_weeks()
            ));
        }

        let reachable = u64::from(policy.included_week_count()) * 7;
        if u64::from(self.required_included_days) > reachable {
            warnings.push(format!(
                "required_included_days ({}) exceeds the {} days available in {} included weeks; \
                 no one can comply",
                self.required_included_days,
                reachable,
                policy.included_week_count()
            ));
        }
        if self.required_included_days == 0 {
            warnings.push("required_included_days is 0; every evaluation is compliant".to_string());
        }

        warnings
    }
}
