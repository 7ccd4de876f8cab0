use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::models::Caller;
use crate::db::counter_repository::{CounterRepository, CounterUpdate};
use crate::error::AppError;

/// The partitions of the recipe collection that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterName {
    /// Every live recipe.
    All,
    /// Live recipes with `is_published == true`.
    Published,
}

impl CounterName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterName::All => "all",
            CounterName::Published => "published",
        }
    }

    /// The partition a caller is allowed to page through.
    pub fn visible_to(caller: &Caller) -> Self {
        if caller.is_authenticated() {
            CounterName::All
        } else {
            CounterName::Published
        }
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both counters, as returned by `GET /api/v1/recipe-counts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub all: u64,
    pub published: u64,
}

/// Eventually-consistent cardinality counters.
///
/// Values are advisory: they are updated after the mutation that changes
/// them and may drift when an update fails or an event is delivered twice.
#[derive(Clone)]
pub struct CounterStore {
    repo: Arc<dyn CounterRepository>,
}

impl CounterStore {
    pub fn new(repo: Arc<dyn CounterRepository>) -> Self {
        Self { repo }
    }

    /// Add 1, creating the counter at 1 when it does not exist yet.
    pub async fn increment(&self, name: CounterName) -> Result<u64, AppError> {
        let key = name.as_str();
        if let CounterUpdate::Applied(value) = self.repo.increment_existing(key).await? {
            return Ok(value);
        }
        if self.repo.create_if_absent(key, 1).await? {
            return Ok(1);
        }
        // Another event created the counter between our two calls.
        match self.repo.increment_existing(key).await? {
            CounterUpdate::Applied(value) => Ok(value),
            other => Err(AppError::Internal(format!(
                "Counter '{key}' could not be incremented: {other:?}"
            ))),
        }
    }

    /// Subtract 1, never going below 0. A missing counter is created at 0.
    pub async fn decrement(&self, name: CounterName) -> Result<u64, AppError> {
        let key = name.as_str();
        match self.repo.decrement_existing(key).await? {
            CounterUpdate::Applied(value) => return Ok(value),
            CounterUpdate::AtFloor => return Ok(0),
            CounterUpdate::Missing => {}
        }
        if self.repo.create_if_absent(key, 0).await? {
            return Ok(0);
        }
        match self.repo.decrement_existing(key).await? {
            CounterUpdate::Applied(value) => Ok(value),
            CounterUpdate::AtFloor => Ok(0),
            CounterUpdate::Missing => Err(AppError::Internal(format!(
                "Counter '{key}' vanished while decrementing"
            ))),
        }
    }

    /// Current value; 0 for a counter that was never created.
    pub async fn count(&self, name: CounterName) -> Result<u64, AppError> {
        Ok(self.repo.read(name.as_str()).await?.unwrap_or(0))
    }

    pub async fn snapshot(&self) -> Result<CounterSnapshot, AppError> {
        let (all, published) =
            futures::try_join!(self.count(CounterName::All), self.count(CounterName::Published))?;
        Ok(CounterSnapshot { all, published })
    }
}
