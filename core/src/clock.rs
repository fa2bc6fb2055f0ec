//! Period clock — owns the engine's notion of the current period.

use crate::types::Period;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodClock {
    pub current_period: Period,
}

impl PeriodClock {
    pub fn new() -> Self {
        Self { current_period: 0 }
    }

    /// Open the next period. Returns the new period number.
    pub fn advance(&mut self) -> Period {
        self.current_period += 1;
        self.current_period
    }
}

impl Default for PeriodClock {
    fn default() -> Self {
        Self::new()
    }
}
