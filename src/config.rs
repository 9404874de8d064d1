// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Asset manager configuration.
//!
//! Every field has a default, so a partial JSON document is a valid config:
//!
//! ```
//! use group_assets::config::AssetConfig;
//!
//! let config = AssetConfig::from_json_str(r#"{"retry": {"max_attempts": 3}}"#).unwrap();
//! assert_eq!(config.retry.max_attempts, 3);
//! assert_eq!(config.preload_groups, vec!["common", "game"]);
//! ```

use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Groups preloaded by `preload_configured` when nothing else is configured
pub const DEFAULT_PRELOAD_GROUPS: [&str; 2] = ["common", "game"];

/// Longest backoff exponent; later attempts reuse the same delay
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Fetch retry policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total fetch attempts per load, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Single attempt; a failed fetch is reported immediately
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bounded(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// Whether another fetch may follow `attempts` failed ones
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before re-issuing after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << shift))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 250,
        }
    }
}

/// Log output settings used by [`crate::logging::init_logging`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `group_assets=debug`
    pub level: String,
    pub json: bool,
    /// Write daily-rolled files here instead of stdout
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
            file_prefix: "group_assets".to_string(),
        }
    }
}

/// Configuration of an [`crate::manager::AssetManager`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub preload_groups: Vec<String>,
    pub retry: RetryPolicy,
    /// Evict least recently requested groups above this many bytes
    pub memory_budget: Option<usize>,
    pub log: LogConfig,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            preload_groups: DEFAULT_PRELOAD_GROUPS.iter().map(|g| g.to_string()).collect(),
            retry: RetryPolicy::default(),
            memory_budget: None,
            log: LogConfig::default(),
        }
    }
}

impl AssetConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AssetError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(AssetError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(group) = self.preload_groups.iter().find(|g| g.is_empty()) {
            return Err(AssetError::ConfigError(format!(
                "preload group keys must not be empty: {group:?}"
            )));
        }
        Ok(())
    }

    pub fn with_preload_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssetConfig::default();
        assert_eq!(config.preload_groups, vec!["common", "game"]);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.memory_budget.is_none());
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = AssetConfig::from_json_str(
            r#"{"preload_groups": ["boot"], "memory_budget": 4096, "log": {"json": true}}"#,
        )
        .unwrap();
        assert_eq!(config.preload_groups, vec!["boot"]);
        assert_eq!(config.memory_budget, Some(4096));
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            AssetConfig::from_json_str(r#"{"retry": {"max_attempts": 0}}"#),
            Err(AssetError::ConfigError(_))
        ));
        assert!(matches!(
            AssetConfig::from_json_str("{not json"),
            Err(AssetError::SerializationError(_))
        ));
        assert!(AssetConfig::from_path("/nonexistent/assets.json").is_err());
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryPolicy::bounded(4, 100);
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
        assert!(retry.allows_retry(3));
        assert!(!retry.allows_retry(4));
        assert!(!RetryPolicy::none().allows_retry(1));
    }
}
