use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(u64);

impl WorkItemId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for WorkItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for WorkItemId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Configuration(
                "Enter a work item ID".to_owned(),
            ));
        }
        if !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(CoreError::Configuration(format!(
                "Work item ID must be a number, got '{trimmed}'"
            )));
        }
        let value = trimmed.parse::<u64>().map_err(|error| {
            CoreError::Configuration(format!("Work item ID '{trimmed}' is out of range: {error}"))
        })?;
        if value == 0 {
            return Err(CoreError::Configuration(
                "Work item ID must be a number greater than zero".to_owned(),
            ));
        }
        Ok(Self(value))
    }
}
