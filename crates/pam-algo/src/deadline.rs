//! Cooperative wall-clock budgets for analysis stages.

use std::time::Duration;

use thiserror::Error;
use web_time::Instant;

/// Why an analysis stage gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("time budget exhausted")]
    BudgetExhausted,

    #[error("non-finite {0} produced")]
    NonFinite(&'static str),

    #[error("stage panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Point in time after which long-running loops should bail out.
///
/// Algorithms poll [`Deadline::check`] between units of work (a Louvain
/// pass, a batch of betweenness sources, a layout iteration). An unbounded
/// deadline never fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    pub fn from_budget(budget: Option<Duration>) -> Self {
        budget.map(Self::after).unwrap_or_else(Self::unbounded)
    }

    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    #[inline]
    pub fn check(&self) -> Result<(), StageError> {
        if self.expired() {
            Err(StageError::BudgetExhausted)
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_expires() {
        let deadline = Deadline::unbounded();
        assert!(!deadline.is_bounded());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn zero_budget_is_already_spent() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.check(), Err(StageError::BudgetExhausted));
    }

    #[test]
    fn generous_budget_is_open() {
        let deadline = Deadline::from_budget(Some(Duration::from_secs(3600)));
        assert!(deadline.is_bounded());
        assert!(!deadline.expired());
    }
}
