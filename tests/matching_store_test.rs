// tests/matching_store_test.rs
// Matching Engine persistence rules (spec.md §4.A, §4.G, §8): round-robin
// fairness (a user is never `user_a` twice in one round), participation
// records for users with no eligible partner, and the disqualified-match
// re-pairing rule gated on a post-match profile update.

use mitko_matchmaker::store::Store;

async fn activate_with_profile(store: &Store, telegram_id: i64, is_seeker: bool, summary: &str, embedding: Vec<f32>) {
    store.get_or_create_user(telegram_id).await.unwrap();
    store
        .apply_profile_update(
            telegram_id,
            is_seeker,
            !is_seeker,
            summary.to_string(),
            None,
            None,
            Some(embedding),
        )
        .await
        .unwrap();
    store.activate_user(telegram_id).await.unwrap();
}

#[tokio::test]
async fn next_user_for_matching_prefers_oldest_profile_update() {
    println!("\n=== Testing round-robin ordering by oldest profile_updated_at ===\n");
    let store = Store::connect_in_memory().await.unwrap();

    activate_with_profile(&store, 4001, true, "backend dev seeking freelance", vec![1.0, 0.0]).await;
    activate_with_profile(&store, 4002, false, "startup hiring a backend dev", vec![0.99, 0.01]).await;

    let next = store.next_user_for_matching(1).await.unwrap().unwrap();
    // 4001 was written first, so it has the earlier profile_updated_at.
    assert_eq!(next.telegram_id, 4001);
}

#[tokio::test]
async fn user_a_cannot_repeat_within_the_same_round() {
    println!("\n=== Testing the once-per-round user_a fairness rule ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    activate_with_profile(&store, 4101, true, "backend dev", vec![1.0, 0.0]).await;
    activate_with_profile(&store, 4102, false, "hiring backend", vec![0.99, 0.01]).await;

    let user_a = store.next_user_for_matching(1).await.unwrap().unwrap();
    assert_eq!(user_a.telegram_id, 4101);

    store.create_participation_record(user_a.telegram_id, 1, user_a.profile_updated_at).await.unwrap();

    // 4101 already participated as user_a in round 1; it must not be offered again.
    let next = store.next_user_for_matching(1).await.unwrap();
    assert!(next.is_none() || next.unwrap().telegram_id != 4101);
}

#[tokio::test]
async fn a_pending_handshake_excludes_a_user_from_being_user_a_again() {
    println!("\n=== Testing pending-handshake exclusion (§4.A next_user_for_matching) ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    activate_with_profile(&store, 4201, true, "backend dev", vec![1.0, 0.0]).await;
    activate_with_profile(&store, 4202, false, "hiring backend", vec![0.99, 0.01]).await;

    let user_a = store.next_user_for_matching(1).await.unwrap().unwrap();
    assert_eq!(user_a.telegram_id, 4201);
    store
        .create_match(user_a.telegram_id, 4202, 0.95, 1, user_a.profile_updated_at)
        .await
        .unwrap();

    // Both parties now owe a consent response; with only these two users,
    // there is nobody left eligible to be user_a this round.
    let next = store.next_user_for_matching(1).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn max_round_with_participants_tracks_the_highest_round_seen() {
    println!("\n=== Testing max_round_with_participants for round-advance decisions ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    activate_with_profile(&store, 4301, true, "backend dev", vec![1.0, 0.0]).await;

    assert_eq!(store.max_round_with_participants().await.unwrap(), 0);

    let user = store.require_user(4301).await.unwrap();
    store.create_participation_record(user.telegram_id, 1, user.profile_updated_at).await.unwrap();
    assert_eq!(store.max_round_with_participants().await.unwrap(), 1);

    store.create_participation_record(user.telegram_id, 2, user.profile_updated_at).await.unwrap();
    assert_eq!(store.max_round_with_participants().await.unwrap(), 2);
}

#[tokio::test]
async fn disqualified_match_excludes_until_a_profile_is_updated_afterward() {
    println!("\n=== Testing the disqualified-match re-pairing rule (§8 scenario 5) ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    activate_with_profile(&store, 4401, true, "backend dev v1", vec![1.0, 0.0]).await;
    activate_with_profile(&store, 4402, false, "hiring backend v1", vec![0.99, 0.01]).await;

    let a = store.require_user(4401).await.unwrap();
    let m = store
        .create_match(a.telegram_id, 4402, 0.95, 1, a.profile_updated_at)
        .await
        .unwrap();
    store.set_match_status(m.id, mitko_matchmaker::domain::MatchStatus::Disqualified).await.unwrap();

    // Neither party has updated their profile since the match was created:
    // the counterpart stays excluded.
    let exclusions = store.match_exclusion_set(4401).await.unwrap();
    assert!(exclusions.contains(&4402), "disqualified match with no later update must still exclude");

    // Now 4401 updates their profile — this must unblock the pair.
    activate_with_profile(&store, 4401, true, "backend dev v2, now also does DevOps", vec![0.5, 0.5]).await;
    let exclusions_after = store.match_exclusion_set(4401).await.unwrap();
    assert!(!exclusions_after.contains(&4402), "a profile update after disqualification must unblock re-matching");
}

#[tokio::test]
async fn connected_matches_are_permanently_excluded_regardless_of_profile_updates() {
    println!("\n=== Testing that non-disqualified statuses exclude permanently ===\n");
    let store = Store::connect_in_memory().await.unwrap();
    activate_with_profile(&store, 4501, true, "backend dev", vec![1.0, 0.0]).await;
    activate_with_profile(&store, 4502, false, "hiring backend", vec![0.99, 0.01]).await;

    let a = store.require_user(4501).await.unwrap();
    let m = store.create_match(a.telegram_id, 4502, 0.95, 1, a.profile_updated_at).await.unwrap();
    store.set_match_status(m.id, mitko_matchmaker::domain::MatchStatus::Connected).await.unwrap();

    activate_with_profile(&store, 4501, true, "backend dev, updated again", vec![0.1, 0.9]).await;
    let exclusions = store.match_exclusion_set(4501).await.unwrap();
    assert!(exclusions.contains(&4502), "a connected match must never be reconsidered");
}
