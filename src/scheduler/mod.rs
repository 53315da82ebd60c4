// src/scheduler/mod.rs
// Generation Scheduler (§4.E): the single in-process serialized queue for
// every language-model call. Grounded on the teacher's `tasks::TaskManager`
// spawn-a-loop-with-an-interval-timer shape, generalized from a fixed-tick
// interval to an event-driven nudge with a per-item deadline, and on the
// original source's `jobs/generation.py` `_processor_loop`/`_find_next_ripe`
// pair for the exact wait/continue control flow.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::config::budget::BudgetConfig;
use crate::domain::{Generation, GenerationUsage, TaskRef};
use crate::error::AppResult;
use crate::metrics;
use crate::store::Store;

/// Dispatches a started generation to the runner for its task kind. One
/// implementation lives at the top of the binary, wiring together the Chat
/// Generation Runner (§4.F) and the Match Rationale Runner (§4.H) so the
/// Scheduler itself never depends on either concretely.
#[async_trait]
pub trait GenerationRunner: Send + Sync {
    async fn run_chat(&self, generation: &Generation) -> AppResult<GenerationUsage>;
    async fn run_match(&self, generation: &Generation) -> AppResult<GenerationUsage>;
}

pub struct Scheduler {
    store: Store,
    budget: BudgetConfig,
    nudge: Arc<Notify>,
}

impl Scheduler {
    pub fn new(store: Store, budget: BudgetConfig) -> Self {
        Self { store, budget, nudge: Arc::new(Notify::new()) }
    }

    /// A clone of the nudge handle for callers that enqueue work from
    /// outside the loop (the Coalescer, the Matching Engine).
    pub fn nudge_handle(&self) -> Arc<Notify> {
        self.nudge.clone()
    }

    /// `scheduled_for = max(now, max_scheduled_for()) + budget_interval()`;
    /// persists a pending row and wakes the loop (§4.E enqueue contract).
    pub async fn create_generation(&self, task_ref: TaskRef) -> AppResult<Generation> {
        let now = Utc::now();
        let floor = self.store.max_scheduled_for().await?.map(|t| t.max(now)).unwrap_or(now);
        let interval = self.budget_interval().await?;
        let scheduled_for = floor + chrono::Duration::milliseconds((interval * 1000.0) as i64);

        let generation = self.store.insert_generation(task_ref, scheduled_for).await?;
        metrics::record_scheduler_interval(interval);
        self.nudge.notify_one();
        Ok(generation)
    }

    /// `last_cost_usd * seconds_per_week / weekly_budget_usd`; zero with no
    /// prior cost on record (§4.E).
    async fn budget_interval(&self) -> AppResult<f64> {
        let last = self.store.last_cost_generation().await?;
        let last_cost = last.and_then(|g| g.usage.cost_usd).unwrap_or(0.0);
        if last_cost <= 0.0 || self.budget.weekly_budget_usd <= 0.0 {
            return Ok(0.0);
        }
        Ok(last_cost * BudgetConfig::SECONDS_PER_WEEK / self.budget.weekly_budget_usd)
    }

    /// Runs until `shutdown` is set. The in-flight generation, if any, is
    /// always allowed to finish — `shutdown` is only checked between
    /// iterations (§4.E, §5 "not preempted").
    pub async fn run(&self, runner: Arc<dyn GenerationRunner>, shutdown: Arc<Notify>) {
        let mut stopping = false;
        loop {
            // Created before the "is there work" check so a nudge delivered
            // in between is never lost (§4.E, §5 set-before-check).
            let notified = self.nudge.notified();

            if stopping {
                return;
            }

            match self.iterate(&runner).await {
                Ok(true) => continue,
                Ok(false) => {
                    let wait = match self.store.min_pending_scheduled_for().await {
                        Ok(Some(t)) => (t - Utc::now()).to_std().unwrap_or(StdDuration::ZERO),
                        Ok(None) => StdDuration::MAX,
                        Err(e) => {
                            error!("scheduler: failed to read next deadline: {}", e);
                            tokio::time::sleep(StdDuration::from_secs(1)).await;
                            continue;
                        }
                    };

                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep(wait), if wait != StdDuration::MAX => {}
                        _ = shutdown.notified() => { stopping = true; }
                    }
                }
                Err(e) => {
                    error!("scheduler loop error: {:#}", e);
                    tokio::time::sleep(StdDuration::from_secs(1)).await;
                }
            }
        }
    }

    /// One pass: start and run the next due generation if any. Returns
    /// `true` if work was found (caller should loop immediately without
    /// waiting), `false` if the queue is currently empty.
    async fn iterate(&self, runner: &Arc<dyn GenerationRunner>) -> AppResult<bool> {
        let Some(pending) = self.store.next_pending_generation(Utc::now()).await? else {
            return Ok(false);
        };

        let started = self.store.start_generation(pending.id).await?;
        let task_kind = match started.task_ref {
            TaskRef::Chat(_) => "chat",
            TaskRef::Match(_) => "match",
        };
        metrics::record_generation_started(task_kind);
        debug!("generation {} started ({})", started.id, task_kind);

        let outcome = match started.task_ref {
            TaskRef::Chat(_) => runner.run_chat(&started).await,
            TaskRef::Match(_) => runner.run_match(&started).await,
        };

        match outcome {
            Ok(usage) => {
                let cost = usage.cost_usd.unwrap_or(0.0);
                self.store.complete_generation(started.id, &usage).await?;
                metrics::record_generation_completed(task_kind, cost);
                debug!("generation {} completed, cost=${:.4}", started.id, cost);
            }
            Err(e) => {
                warn!("generation {} failed: {:#}", started.id, e);
                self.store.fail_generation(started.id).await?;
                metrics::record_generation_failed(task_kind);
            }
        }

        Ok(true)
    }
}

/// Formats a wait duration for the Coalescer's status message (§4.F step 3):
/// "soon" under 10s, "shortly" under a minute, else "~H h M min".
pub fn format_wait(wait: StdDuration) -> String {
    let total_secs = wait.as_secs();
    if total_secs < 10 {
        "soon".to_string()
    } else if total_secs < 60 {
        "shortly".to_string()
    } else {
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        if hours > 0 {
            format!("~{} h {} min", hours, minutes)
        } else {
            format!("~{} min", minutes.max(1))
        }
    }
}
