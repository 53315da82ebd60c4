// tests/generation_lifecycle_test.rs
// Generation Scheduler persistence invariants (spec.md §8): the
// pending -> started -> {completed|failed} transition graph, ordering by
// `scheduled_for` with an id tie-break, and the started_at <=> status
// equivalence.

use chrono::Utc;
use mitko_matchmaker::domain::{GenerationStatus, GenerationUsage, TaskRef};
use mitko_matchmaker::store::Store;

async fn setup() -> Store {
    Store::connect_in_memory().await.expect("failed to create in-memory store")
}

#[tokio::test]
async fn pending_generation_has_no_started_at() {
    println!("\n=== Testing fresh generation is pending with no started_at ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1001).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();

    let generation = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();

    assert_eq!(generation.status, GenerationStatus::Pending);
    assert!(generation.started_at.is_none());
}

#[tokio::test]
async fn start_then_complete_respects_transition_graph() {
    println!("\n=== Testing pending -> started -> completed transition ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1002).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();
    let generation = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();

    let started = store.start_generation(generation.id).await.unwrap();
    assert_eq!(started.status, GenerationStatus::Started);
    assert!(started.started_at.is_some(), "started_at must be set on transition to started");

    let usage = GenerationUsage {
        cached_input_tokens: Some(10),
        uncached_input_tokens: Some(90),
        output_tokens: Some(40),
        cost_usd: Some(0.0123),
        provider_response_id: Some("resp_abc".to_string()),
    };
    store.complete_generation(generation.id, &usage).await.unwrap();

    let completed = store.require_generation(generation.id).await.unwrap();
    assert_eq!(completed.status, GenerationStatus::Completed);
    assert_eq!(completed.usage.cost_usd, Some(0.0123));
    assert_eq!(completed.usage.provider_response_id.as_deref(), Some("resp_abc"));
}

#[tokio::test]
async fn failed_generation_keeps_started_at_but_moves_to_failed() {
    println!("\n=== Testing pending -> started -> failed transition ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1003).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();
    let generation = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    store.start_generation(generation.id).await.unwrap();

    store.fail_generation(generation.id).await.unwrap();
    let failed = store.require_generation(generation.id).await.unwrap();
    assert_eq!(failed.status, GenerationStatus::Failed);
}

#[tokio::test]
async fn next_pending_generation_orders_by_scheduled_for_then_id() {
    println!("\n=== Testing queue ordering: scheduled_for ascending, id tie-break ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1004).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();

    let now = Utc::now();
    let later = now + chrono::Duration::seconds(60);

    let first = store.insert_generation(TaskRef::Chat(chat.id), later).await.unwrap();
    let second = store.insert_generation(TaskRef::Chat(chat.id), now).await.unwrap();
    let third = store.insert_generation(TaskRef::Chat(chat.id), now).await.unwrap();

    // `second` and `third` share `now` as scheduled_for; `second` has the
    // lower id and must win the tie-break.
    let next = store.next_pending_generation(later + chrono::Duration::seconds(1)).await.unwrap().unwrap();
    assert_eq!(next.id, second.id);

    store.start_generation(second.id).await.unwrap();
    store.complete_generation(second.id, &GenerationUsage::default()).await.unwrap();

    let next = store.next_pending_generation(later + chrono::Duration::seconds(1)).await.unwrap().unwrap();
    assert_eq!(next.id, third.id);

    let _ = first; // scheduled furthest in the future, never selected above
}

#[tokio::test]
async fn min_pending_scheduled_for_tracks_the_earliest_future_row() {
    println!("\n=== Testing min_pending_scheduled_for for sleep calculation ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1005).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();

    assert!(store.min_pending_scheduled_for().await.unwrap().is_none());

    let now = Utc::now();
    let soon = now + chrono::Duration::seconds(30);
    let later = now + chrono::Duration::seconds(300);
    store.insert_generation(TaskRef::Chat(chat.id), later).await.unwrap();
    store.insert_generation(TaskRef::Chat(chat.id), soon).await.unwrap();

    let min = store.min_pending_scheduled_for().await.unwrap().unwrap();
    assert_eq!(min.timestamp(), soon.timestamp());
}

#[tokio::test]
async fn last_cost_generation_is_most_recently_started_with_cost() {
    println!("\n=== Testing last_cost_generation for budget pacing ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(1006).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();

    assert!(store.last_cost_generation().await.unwrap().is_none());

    let g1 = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    store.start_generation(g1.id).await.unwrap();
    store
        .complete_generation(g1.id, &GenerationUsage { cost_usd: Some(0.01), ..Default::default() })
        .await
        .unwrap();

    let g2 = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    store.start_generation(g2.id).await.unwrap();
    store
        .complete_generation(g2.id, &GenerationUsage { cost_usd: Some(0.02), ..Default::default() })
        .await
        .unwrap();

    let last = store.last_cost_generation().await.unwrap().unwrap();
    assert_eq!(last.id, g2.id);
    assert_eq!(last.usage.cost_usd, Some(0.02));
}
