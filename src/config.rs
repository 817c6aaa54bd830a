use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dependency::{ConstraintType, Hardness};
use crate::error::{Result, ScheduleError};
use crate::time_unit::TimeDuration;

/// Defaults applied by the task manager when a caller leaves a value out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_start: NaiveDate,
    pub default_duration: TimeDuration,
    pub default_constraint: ConstraintType,
    pub default_hardness: Hardness,
    /// Run the scheduler after each edit.
    pub scheduler_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_start: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default(),
            default_duration: TimeDuration::days(1),
            default_constraint: ConstraintType::FinishStart,
            default_hardness: Hardness::Strong,
            scheduler_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_duration.length < 0 {
            return Err(ScheduleError::Config(format!(
                "default duration must not be negative, got {}",
                self.default_duration.length
            )));
        }
        Ok(())
    }
}
