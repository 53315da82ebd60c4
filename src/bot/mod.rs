// src/bot/mod.rs
// Bot Front Door (SPEC_FULL §4.I): owns the teloxide `Dispatcher`, routing
// inbound updates to `handlers`. Grounded on the teacher's `main.rs`
// dispatch-table habit (one branch per inbound family) generalized from an
// MCP tool router to teloxide's `dptree`.

pub mod handlers;
pub mod keyboards;

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;

pub use handlers::BotState;

pub async fn run(bot: Bot, state: Arc<BotState>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::on_message))
        .branch(Update::filter_callback_query().endpoint(handlers::on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
