//! Workflow limits, with environment overrides.

use crate::PolicyError;
use nq_core::message::RetryContext;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_syntax_retries: u32,
    pub max_semantic_retries: u32,
    /// Generation confidence strictly below this triggers schema re-analysis.
    pub confidence_threshold: f64,
    pub sql_timeout_secs: f64,
    /// Rows fetched per query; extra rows are dropped.
    pub max_rows: usize,
    /// Serialized result characters passed to the reasoning evaluator.
    pub eval_result_preview_chars: usize,
    /// Rows rendered in the markdown table of the NL response.
    pub nl_table_max_rows: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_syntax_retries: 2,
            max_semantic_retries: 2,
            confidence_threshold: 50.0,
            sql_timeout_secs: 30.0,
            max_rows: 1000,
            eval_result_preview_chars: 2000,
            nl_table_max_rows: 10,
        }
    }
}

impl WorkflowConfig {
    /// Defaults overridden by `NL2SQL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Unparseable values
    /// are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        override_from(&lookup, "NL2SQL_MAX_SYNTAX_RETRIES", &mut config.max_syntax_retries);
        override_from(&lookup, "NL2SQL_MAX_SEMANTIC_RETRIES", &mut config.max_semantic_retries);
        override_from(&lookup, "NL2SQL_CONFIDENCE_THRESHOLD", &mut config.confidence_threshold);
        override_from(&lookup, "NL2SQL_SQL_TIMEOUT_SECS", &mut config.sql_timeout_secs);
        override_from(&lookup, "NL2SQL_MAX_ROWS", &mut config.max_rows);
        config
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(PolicyError::InvalidConfig(format!(
                "confidence_threshold {} outside 0..=100",
                self.confidence_threshold
            )));
        }
        if !self.sql_timeout_secs.is_finite() || self.sql_timeout_secs <= 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "sql_timeout_secs must be positive, got {}",
                self.sql_timeout_secs
            )));
        }
        if self.max_rows == 0 {
            return Err(PolicyError::InvalidConfig("max_rows must be at least 1".into()));
        }
        Ok(())
    }

    pub fn sql_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.sql_timeout_secs)
    }

    /// Fresh retry counters carrying this config's budgets.
    pub fn retry_context(&self) -> RetryContext {
        RetryContext::new(self.max_syntax_retries, self.max_semantic_retries)
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config override"),
    }
}
