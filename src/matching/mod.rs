// src/matching/mod.rs
// Matching Engine (§4.G): a long-lived loop that finds at most one match
// candidate per pass, enqueues its rationale generation, and exits — it is
// restarted by a nudge from profile activation or from the Match Rationale
// Runner. Grounded on the Scheduler's own notify-driven wait (§4.E) and on
// the original source's `jobs/matching.py` round-robin/`_advance_round` pair.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::config::matching::MatchingConfig;
use crate::domain::TaskRef;
use crate::error::AppResult;
use crate::metrics;
use crate::scheduler::Scheduler;
use crate::store::Store;

enum PassOutcome {
    /// A match was created and its generation enqueued; wait for a nudge.
    Enqueued,
    /// No eligible user remains in the current round and no later round has
    /// participants yet; wait for a nudge or the retry interval.
    Idle,
}

pub struct MatchingEngine {
    store: Store,
    config: MatchingConfig,
    scheduler: Arc<Scheduler>,
    nudge: Arc<Notify>,
}

impl MatchingEngine {
    pub fn new(store: Store, config: MatchingConfig, scheduler: Arc<Scheduler>) -> Self {
        Self { store, config, scheduler, nudge: Arc::new(Notify::new()) }
    }

    /// A clone of the nudge handle for callers that restart the loop from
    /// outside (profile activation, the Match Rationale Runner).
    pub fn nudge_handle(&self) -> Arc<Notify> {
        self.nudge.clone()
    }

    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut round: i64 = 1;
        loop {
            // Set up before running the pass so a nudge delivered mid-pass is
            // never lost, matching the Scheduler's own discipline (§4.E, §5).
            let notified = self.nudge.notified();

            match self.run_pass(&mut round).await {
                Ok(PassOutcome::Enqueued) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = shutdown.notified() => return,
                    }
                }
                Ok(PassOutcome::Idle) => {
                    let retry = StdDuration::from_secs(self.config.retry_interval_secs);
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep(retry) => {}
                        _ = shutdown.notified() => return,
                    }
                }
                Err(e) => {
                    error!("matching loop error: {:#}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(StdDuration::from_secs(1)) => {}
                        _ = shutdown.notified() => return,
                    }
                }
            }
        }
    }

    /// Steps 1-5 of §4.G, looping internally over round-advance and
    /// participation-record cases (neither of which waits).
    async fn run_pass(&self, round: &mut i64) -> AppResult<PassOutcome> {
        loop {
            let Some(user_a) = self.store.next_user_for_matching(*round).await? else {
                let max_round = self.store.max_round_with_participants().await?;
                if max_round == *round {
                    return Ok(PassOutcome::Idle);
                }
                *round += 1;
                metrics::record_round_advanced(*round);
                debug!("matching: advanced to round {}", round);
                continue;
            };

            let exclusions = self.store.match_exclusion_set(user_a.telegram_id).await?;
            let candidates = self
                .store
                .similar_opposite_role_users(&user_a, self.config.similarity_threshold, self.config.max_candidates, &exclusions)
                .await?;

            let Some((user_b, score)) = candidates.into_iter().next() else {
                self.store.create_participation_record(user_a.telegram_id, *round, user_a.profile_updated_at).await?;
                metrics::record_participation_record();
                continue;
            };

            let latest = max_profile_updated_at(user_a.profile_updated_at, user_b.profile_updated_at);
            let created = self.store.create_match(user_a.telegram_id, user_b.telegram_id, score, *round, latest).await?;
            metrics::record_match_created(score);
            info!("matching: created match {} (round {}, similarity {:.3})", created.id, round, score);

            self.scheduler.create_generation(TaskRef::Match(created.id)).await?;
            return Ok(PassOutcome::Enqueued);
        }
    }
}

fn max_profile_updated_at(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn max_profile_updated_at_prefers_later() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(max_profile_updated_at(Some(earlier), Some(later)), Some(later));
        assert_eq!(max_profile_updated_at(None, Some(later)), Some(later));
        assert_eq!(max_profile_updated_at(Some(earlier), None), Some(earlier));
        assert_eq!(max_profile_updated_at(None, None), None);
    }
}
