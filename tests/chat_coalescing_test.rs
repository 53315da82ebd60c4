// tests/chat_coalescing_test.rs
// Message Coalescer persistence invariants (spec.md §8, scenario 2): inbound
// text concatenates onto `chat.user_prompt` with "\n\n", and the atomic
// consume in step 3 of the Chat Generation Runner clears it afterward.

use mitko_matchmaker::store::Store;

async fn setup() -> Store {
    Store::connect_in_memory().await.expect("failed to create in-memory store")
}

#[tokio::test]
async fn appends_multiple_messages_in_order_with_blank_line_separator() {
    println!("\n=== Testing rapid-fire message coalescing ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(2001).await.unwrap();

    store.append_user_prompt(user.telegram_id, "hi").await.unwrap();
    store.append_user_prompt(user.telegram_id, "I'm Alice").await.unwrap();
    let chat = store.append_user_prompt(user.telegram_id, "frontend + React").await.unwrap();

    assert_eq!(chat.user_prompt.as_deref(), Some("hi\n\nI'm Alice\n\nfrontend + React"));
}

#[tokio::test]
async fn first_message_sets_prompt_without_leading_separator() {
    println!("\n=== Testing a single inbound message needs no separator ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(2002).await.unwrap();

    let chat = store.append_user_prompt(user.telegram_id, "hello there").await.unwrap();
    assert_eq!(chat.user_prompt.as_deref(), Some("hello there"));
}

#[tokio::test]
async fn take_user_prompt_atomically_consumes_and_clears() {
    println!("\n=== Testing the atomic consume used by Chat Generation Runner step 3 ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(2003).await.unwrap();
    let chat = store.append_user_prompt(user.telegram_id, "what's up").await.unwrap();

    let taken = store.take_user_prompt(chat.id).await.unwrap();
    assert_eq!(taken.as_deref(), Some("what's up"));

    let refreshed = store.get_chat_by_id(chat.id).await.unwrap().unwrap();
    assert!(refreshed.user_prompt.is_none());

    // Consuming an already-empty prompt is an invariant violation the caller
    // must detect (§7) — the store surfaces it as `None`, not an error.
    let second_take = store.take_user_prompt(chat.id).await.unwrap();
    assert!(second_take.is_none());
}

#[tokio::test]
async fn status_message_id_is_cleared_when_transferred_to_the_generation() {
    println!("\n=== Testing placeholder transfer clears the chat's copy ===\n");
    let store = setup().await;
    let user = store.get_or_create_user(2004).await.unwrap();
    let chat = store.get_or_create_chat(user.telegram_id).await.unwrap();

    store.set_status_message_id(chat.id, Some(555)).await.unwrap();
    let with_status = store.get_chat_by_id(chat.id).await.unwrap().unwrap();
    assert_eq!(with_status.status_message_id, Some(555));

    store.set_status_message_id(chat.id, None).await.unwrap();
    let cleared = store.get_chat_by_id(chat.id).await.unwrap().unwrap();
    assert!(cleared.status_message_id.is_none());
}
