// tests/chat_runner_embedding_test.rs
// Chat Generation Runner + profile side-effect (spec.md §4.F, §4.F.i, §8):
// the embedding is regenerated if and only if `matching_summary` changes,
// and the placeholder lifecycle never drops the reply.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{profile, FakeAgent, FakeTransport};
use mitko_matchmaker::agent::{ConversationResponse, LanguageAgent};
use mitko_matchmaker::coalescer::chat_runner::ChatGenerationRunner;
use mitko_matchmaker::domain::TaskRef;
use mitko_matchmaker::store::Store;
use mitko_matchmaker::transport::ChatTransport;

#[tokio::test]
async fn embedding_regenerates_only_when_summary_changes() {
    println!("\n=== Testing embedding regeneration is conditional on matching_summary change ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let transport: Arc<dyn ChatTransport> = Arc::new(FakeTransport::new());
    let agent = Arc::new(FakeAgent::new());
    let agent_trait: Arc<dyn LanguageAgent> = agent.clone();

    let user = store.get_or_create_user(3001).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();
    let runner = ChatGenerationRunner::new(store.clone(), transport.clone(), agent_trait.clone());

    // Turn 1: fresh profile extraction.
    agent.queue_conversation(ConversationResponse {
        utterance: "Nice to meet you, backend dev!".to_string(),
        profile: Some(profile("Senior Rust backend engineer, 8 years, distributed systems")),
    });
    store.append_user_prompt(user.telegram_id, "I'm a backend dev").await.unwrap();
    let gen1 = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    runner.run(&gen1).await.expect("turn 1 should succeed");
    assert_eq!(agent.embed_call_count(), 1, "first profile write must embed once");

    // Turn 2: same matching_summary repeated — no new embedding call (§8 property).
    agent.queue_conversation(ConversationResponse {
        utterance: "Got it, noted.".to_string(),
        profile: Some(profile("Senior Rust backend engineer, 8 years, distributed systems")),
    });
    store.append_user_prompt(user.telegram_id, "also I know Kubernetes").await.unwrap();
    let gen2 = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    runner.run(&gen2).await.expect("turn 2 should succeed");
    assert_eq!(agent.embed_call_count(), 1, "unchanged summary must not re-embed");

    // Turn 3: a genuinely different summary — embeds again.
    agent.queue_conversation(ConversationResponse {
        utterance: "Updated your profile.".to_string(),
        profile: Some(profile("Senior Rust backend engineer who also does platform/SRE work")),
    });
    store.append_user_prompt(user.telegram_id, "also I do on-call/SRE work").await.unwrap();
    let gen3 = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    runner.run(&gen3).await.expect("turn 3 should succeed");
    assert_eq!(agent.embed_call_count(), 2, "changed summary must re-embed");

    let final_user = store.require_user(user.telegram_id).await.unwrap();
    assert!(final_user.has_embedding);
    assert_eq!(
        final_user.matching_summary.as_deref(),
        Some("Senior Rust backend engineer who also does platform/SRE work")
    );
}

#[tokio::test]
async fn turn_without_profile_leaves_state_unready_and_never_embeds() {
    println!("\n=== Testing a chit-chat turn with no extracted profile ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let transport: Arc<dyn ChatTransport> = Arc::new(FakeTransport::new());
    let agent = Arc::new(FakeAgent::new());
    let agent_trait: Arc<dyn LanguageAgent> = agent.clone();

    let user = store.get_or_create_user(3002).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();
    let runner = ChatGenerationRunner::new(store.clone(), transport.clone(), agent_trait);

    agent.queue_conversation(ConversationResponse { utterance: "Hi there! Tell me about your work.".to_string(), profile: None });
    store.append_user_prompt(user.telegram_id, "hi").await.unwrap();
    let gen = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    runner.run(&gen).await.expect("turn should succeed even with no profile yet");

    assert_eq!(agent.embed_call_count(), 0);
    let refreshed_chat = store.get_chat_by_id(chat.id).await.unwrap().unwrap();
    assert!(refreshed_chat.user_prompt.is_none(), "prompt must be consumed after the turn completes");
    assert_eq!(refreshed_chat.message_history.len(), 2, "history holds the prompt and the reply");
}

#[tokio::test]
async fn reply_is_delivered_as_a_fresh_message_when_no_new_prompt_arrived() {
    println!("\n=== Testing placeholder delete-and-resend path (§4.F step 6) ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    let transport = Arc::new(FakeTransport::new());
    let transport_trait: Arc<dyn ChatTransport> = transport.clone();
    let agent = Arc::new(FakeAgent::new());
    let agent_trait: Arc<dyn LanguageAgent> = agent.clone();

    let user = store.get_or_create_user(3003).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();
    store.set_status_message_id(chat.id, Some(42)).await.unwrap();

    let runner = ChatGenerationRunner::new(store.clone(), transport_trait, agent_trait);
    agent.queue_conversation(ConversationResponse { utterance: "Here's my answer.".to_string(), profile: None });
    store.append_user_prompt(user.telegram_id, "what do you think?").await.unwrap();
    let gen = store.insert_generation(TaskRef::Chat(chat.id), Utc::now()).await.unwrap();
    runner.run(&gen).await.expect("turn should succeed");

    assert_eq!(transport.deleted_count(), 1, "the placeholder must be deleted");
    assert_eq!(transport.sent_count(), 1, "the reply must be sent as a fresh message");
    assert_eq!(transport.last_sent_text().as_deref(), Some("Here's my answer."));
}
