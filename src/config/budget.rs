// src/config/budget.rs
// Weekly monetary budget used to pace the Generation Scheduler.

use serde::{Deserialize, Serialize};

use super::helpers::env_parsed_or;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub weekly_budget_usd: f64,
}

impl BudgetConfig {
    pub const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0;

    pub fn from_env() -> Self {
        Self {
            weekly_budget_usd: env_parsed_or("WEEKLY_BUDGET_USD", 5.0),
        }
    }
}
