use super::*;

#[test]
fn new_message_carries_metadata() {
    let message = NewMessage {
        user_id: "u1",
        session_id: "s1",
        message_type: "assistant",
        message_text: "hello",
        response_time_ms: Some(123),
        tokens_used: Some(42),
    };
    assert_eq!(message.message_type, "assistant");
    assert_eq!(message.response_time_ms, Some(123));
    assert_eq!(message.tokens_used, Some(42));
}

// Live-database tests. Run with:
//   DATABASE_URL=postgres://... cargo test --features live-db-tests

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;

    async fn live_pool() -> sqlx::PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
        let pool = sqlx::PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("src/db/migrations").run(&pool).await.expect("migrate");
        pool
    }

    fn unique_user() -> String {
        format!("test-user-{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let pool = live_pool().await;
        let user_id = unique_user();

        ensure_user(&pool, &user_id, "s1").await.expect("first upsert");
        ensure_user(&pool, &user_id, "s1").await.expect("second upsert");

        let user = find_user(&pool, &user_id).await.expect("find").expect("exists");
        assert_eq!(user.user_id, user_id);
    }

    #[tokio::test]
    async fn store_and_fetch_round_trip() {
        let pool = live_pool().await;
        let user_id = unique_user();
        ensure_user(&pool, &user_id, "s1").await.expect("upsert");

        let first = store_message(
            &pool,
            &NewMessage {
                user_id: &user_id,
                session_id: "s1",
                message_type: "user",
                message_text: "hi there",
                response_time_ms: None,
                tokens_used: None,
            },
        )
        .await
        .expect("store user message");

        store_message(
            &pool,
            &NewMessage {
                user_id: &user_id,
                session_id: "s1",
                message_type: "assistant",
                message_text: "hello!",
                response_time_ms: Some(250),
                tokens_used: Some(12),
            },
        )
        .await
        .expect("store assistant message");

        let history = fetch_history(&pool, &user_id, None, None).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message_id, first);
        assert_eq!(history[0].message_type, "user");
        assert_eq!(history[1].message_type, "assistant");
        assert_eq!(history[1].response_time_ms, Some(250));

        assert_eq!(count_user_messages(&pool, &user_id).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn conversation_history_is_oldest_first_and_capped() {
        let pool = live_pool().await;
        let user_id = unique_user();
        ensure_user(&pool, &user_id, "s1").await.expect("upsert");

        for i in 0..5 {
            store_message(
                &pool,
                &NewMessage {
                    user_id: &user_id,
                    session_id: "s1",
                    message_type: "user",
                    message_text: &format!("message {i}"),
                    response_time_ms: None,
                    tokens_used: None,
                },
            )
            .await
            .expect("store");
        }

        let turns = conversation_history(&pool, &user_id, "s1", 3).await.expect("turns");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "message 2");
        assert_eq!(turns[2].text, "message 4");
    }

    #[tokio::test]
    async fn fetch_history_filters_by_session() {
        let pool = live_pool().await;
        let user_id = unique_user();
        ensure_user(&pool, &user_id, "a").await.expect("upsert");

        for session in ["a", "b"] {
            store_message(
                &pool,
                &NewMessage {
                    user_id: &user_id,
                    session_id: session,
                    message_type: "user",
                    message_text: session,
                    response_time_ms: None,
                    tokens_used: None,
                },
            )
            .await
            .expect("store");
        }

        let only_a = fetch_history(&pool, &user_id, Some("a"), None).await.expect("history");
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].message_text, "a");
    }
}
