// tests/consent_handshake_test.rs
// Match Rationale & Intro Runner consent state machine (spec.md §4.H, §8
// scenario 4): pending -> a_accepted -> connected, with each side receiving
// the other's display profile and never `private_observations`.

mod common;

use std::sync::Arc;

use common::{FakeAgent, FakeTransport};
use mitko_matchmaker::agent::LanguageAgent;
use mitko_matchmaker::domain::MatchStatus;
use mitko_matchmaker::rationale::MatchRationaleRunner;
use mitko_matchmaker::store::Store;
use mitko_matchmaker::transport::ChatTransport;
use tokio::sync::Notify;

async fn seed_pair(store: &Store) -> (i64, i64, i64) {
    store.get_or_create_user(5001).await.unwrap();
    store
        .apply_profile_update(
            5001,
            true,
            false,
            "Backend engineer, Rust + Postgres".to_string(),
            Some("Open to contract work".to_string()),
            Some("Tends to lowball rates, push back gently".to_string()),
            Some(vec![1.0, 0.0]),
        )
        .await
        .unwrap();
    store.get_or_create_user(5002).await.unwrap();
    store
        .apply_profile_update(
            5002,
            false,
            true,
            "Seed-stage startup hiring backend help".to_string(),
            Some("Remote-first, flexible hours".to_string()),
            None,
            Some(vec![0.99, 0.01]),
        )
        .await
        .unwrap();

    let a = store.require_user(5001).await.unwrap();
    let m = store.create_match(5001, 5002, 0.93, 1, a.profile_updated_at).await.unwrap();
    (m.id, 5001, 5002)
}

#[tokio::test]
async fn sequential_accepts_drive_pending_to_connected() {
    println!("\n=== Testing the two-party accept -> accept -> connected handshake ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let (match_id, user_a, user_b) = seed_pair(&store).await;

    let transport = Arc::new(FakeTransport::new());
    let transport_trait: Arc<dyn ChatTransport> = transport.clone();
    let agent: Arc<dyn LanguageAgent> = Arc::new(FakeAgent::new());
    let nudge = Arc::new(Notify::new());
    let runner = MatchRationaleRunner::new(store.clone(), transport_trait, agent, nudge);

    runner.handle_consent(match_id, user_a, true).await.unwrap();
    let after_a = store.require_match(match_id).await.unwrap();
    assert_eq!(after_a.status, MatchStatus::AAccepted);

    runner.handle_consent(match_id, user_b, true).await.unwrap();
    let after_b = store.require_match(match_id).await.unwrap();
    assert_eq!(after_b.status, MatchStatus::Connected);

    // Both parties should have received a display profile on connection —
    // never `private_observations`.
    let sent = transport.last_sent_text().unwrap_or_default();
    assert!(!sent.contains("lowball"), "private_observations must never reach either user");
}

#[tokio::test]
async fn either_side_rejecting_ends_the_handshake() {
    println!("\n=== Testing a reject from either party ends the match ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let (match_id, user_a, _user_b) = seed_pair(&store).await;

    let transport: Arc<dyn ChatTransport> = Arc::new(FakeTransport::new());
    let agent: Arc<dyn LanguageAgent> = Arc::new(FakeAgent::new());
    let nudge = Arc::new(Notify::new());
    let runner = MatchRationaleRunner::new(store.clone(), transport, agent, nudge);

    runner.handle_consent(match_id, user_a, false).await.unwrap();
    let after = store.require_match(match_id).await.unwrap();
    assert_eq!(after.status, MatchStatus::Rejected);
}

#[tokio::test]
async fn a_double_accept_from_the_same_party_is_a_no_op() {
    println!("\n=== Testing a duplicate accept from the same party changes nothing ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let (match_id, user_a, _user_b) = seed_pair(&store).await;

    let transport: Arc<dyn ChatTransport> = Arc::new(FakeTransport::new());
    let agent: Arc<dyn LanguageAgent> = Arc::new(FakeAgent::new());
    let nudge = Arc::new(Notify::new());
    let runner = MatchRationaleRunner::new(store.clone(), transport, agent, nudge);

    runner.handle_consent(match_id, user_a, true).await.unwrap();
    runner.handle_consent(match_id, user_a, true).await.unwrap();

    let after = store.require_match(match_id).await.unwrap();
    assert_eq!(after.status, MatchStatus::AAccepted, "a second accept from A alone must not advance the state machine");
}

#[tokio::test]
async fn running_the_generation_sends_one_intro_per_user_and_persists_rationale() {
    println!("\n=== Testing the two-phase rationale + per-user intro generation ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let (match_id, _user_a, _user_b) = seed_pair(&store).await;

    let transport = Arc::new(FakeTransport::new());
    let transport_trait: Arc<dyn ChatTransport> = transport.clone();
    let agent = Arc::new(FakeAgent::new());
    agent.queue_conversation(mitko_matchmaker::agent::ConversationResponse {
        utterance: "You've been matched! Here's why...".to_string(),
        profile: None,
    });
    agent.queue_conversation(mitko_matchmaker::agent::ConversationResponse {
        utterance: "Great news, we found someone for you too!".to_string(),
        profile: None,
    });
    let agent_trait: Arc<dyn LanguageAgent> = agent.clone();
    let nudge = Arc::new(Notify::new());
    let runner = MatchRationaleRunner::new(store.clone(), transport_trait, agent_trait, nudge.clone());

    let generation = mitko_matchmaker::domain::Generation {
        id: 1,
        task_ref: mitko_matchmaker::domain::TaskRef::Match(match_id),
        scheduled_for: chrono::Utc::now(),
        status: mitko_matchmaker::domain::GenerationStatus::Started,
        started_at: Some(chrono::Utc::now()),
        usage: Default::default(),
        placeholder_message_id: None,
        created_at: chrono::Utc::now(),
    };

    runner.run(&generation).await.expect("rationale + intro generation should succeed");

    assert_eq!(transport.sent_count(), 2, "exactly one intro per matched user");
    let m = store.require_match(match_id).await.unwrap();
    assert_eq!(m.status, MatchStatus::Qualified);
    assert!(m.match_rationale.is_some());
}
