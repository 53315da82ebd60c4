// src/rate_gates/mod.rs
// Single-process throttlers shared by every outbound send (§4.B).

mod gate;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

pub use gate::IntervalGate;

/// The three gates named in §4.B. Per-chat debounce is keyed by chat id
/// since the global gate alone cannot express "no more than one send per
/// second to the *same* user".
pub struct RateGates {
    global: IntervalGate,
    per_chat: Mutex<HashMap<i64, Arc<IntervalGate>>>,
    admin: IntervalGate,
}

impl RateGates {
    pub fn new() -> Self {
        Self {
            global: IntervalGate::new(Duration::from_secs_f64(1.0 / 30.0), "global"),
            per_chat: Mutex::new(HashMap::new()),
            admin: IntervalGate::new(Duration::from_secs_f64(3.0), "admin"),
        }
    }

    /// Acquire the per-chat gate, then the global gate — deterministic order
    /// as specified, so a caller never waits on the global gate only to then
    /// be blocked behind a different chat's debounce.
    pub async fn acquire_chat_send(&self, chat_telegram_id: i64) {
        let gate = {
            let mut gates = self.per_chat.lock().await;
            gates
                .entry(chat_telegram_id)
                .or_insert_with(|| Arc::new(IntervalGate::new(Duration::from_secs_f64(1.0), "chat")))
                .clone()
        };
        gate.acquire().await;
        self.global.acquire().await;
    }

    /// Acquire the admin gate, then the global gate.
    pub async fn acquire_admin_send(&self) {
        self.admin.acquire().await;
        self.global.acquire().await;
    }
}

impl Default for RateGates {
    fn default() -> Self {
        Self::new()
    }
}
