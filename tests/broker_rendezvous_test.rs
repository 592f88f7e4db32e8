//! Integration tests for the review rendezvous
//!
//! Drives the broker the way the MCP tool and the gateway do: one task waits
//! for the outcome while others submit, reprocess, or let the deadline pass.

mod common;

use common::{
    create_session, echo_broker, test_broker, EchoEnhancer, FailingEnhancer, GatedEnhancer,
};
use interlude_core::error::InterludeError;
use interlude_core::types::{END_CONVERSATION_MARKER, USE_ORIGINAL_MARKER};
use interlude_core::{EventType, Outcome, SessionBroker, SessionId, SessionStatus};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn spawn_waiter(
    broker: &SessionBroker,
    id: SessionId,
) -> tokio::task::JoinHandle<interlude_core::Result<Outcome>> {
    let broker = broker.clone();
    tokio::spawn(async move { broker.await_completion(id).await })
}

/// Let spawned waiters subscribe before the test acts
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_submit_draft_unchanged() {
    let broker = echo_broker();
    let id = create_session(&broker).await;

    let waiter = spawn_waiter(&broker, id);
    settle().await;
    assert!(!waiter.is_finished(), "await must block until a decision");

    broker.submit(id, "draft".to_string()).await.unwrap();

    assert_eq!(
        waiter.await.unwrap().unwrap(),
        Outcome::Edited("draft".to_string())
    );
    assert!(matches!(
        broker.store().get(id).await,
        Err(InterludeError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_use_original_resolves_to_fallback() {
    let broker = echo_broker();
    let id = create_session(&broker).await;
    let waiter = spawn_waiter(&broker, id);
    settle().await;

    broker
        .submit(id, USE_ORIGINAL_MARKER.to_string())
        .await
        .unwrap();

    assert_eq!(
        waiter.await.unwrap().unwrap(),
        Outcome::Original("orig".to_string())
    );
}

#[tokio::test]
async fn test_end_conversation_sentinel() {
    let broker = echo_broker();
    let id = create_session(&broker).await;
    let waiter = spawn_waiter(&broker, id);
    settle().await;

    broker
        .submit(id, END_CONVERSATION_MARKER.to_string())
        .await
        .unwrap();

    assert_eq!(waiter.await.unwrap().unwrap(), Outcome::EndConversation);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_times_out_then_late_submit_not_found() {
    let broker = test_broker(
        Arc::new(EchoEnhancer::default()),
        Duration::from_millis(50),
    );
    let id = create_session(&broker).await;
    let waiter = spawn_waiter(&broker, id);

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(matches!(
        waiter.await.unwrap(),
        Err(InterludeError::Timeout(_))
    ));
    assert!(matches!(
        broker.submit(id, "x".to_string()).await,
        Err(InterludeError::SessionNotFound(_))
    ));
    assert_eq!(broker.pending_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_at_guard_instant_has_one_winner() {
    let broker = test_broker(
        Arc::new(EchoEnhancer::default()),
        Duration::from_millis(50),
    );
    let mut events = broker.events().subscribe();
    let review = broker
        .open("draft".into(), "orig".into(), String::new(), vec![])
        .await
        .unwrap();
    let id = review.id();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(50);

    let submitter = {
        let broker = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            broker.submit(id, "on the wire".to_string()).await
        })
    };

    let outcome = review.wait().await;
    let submitted = submitter.await.unwrap();

    match &submitted {
        Ok(()) => assert_eq!(outcome.unwrap(), Outcome::Edited("on the wire".to_string())),
        Err(InterludeError::AlreadyResolved(_)) | Err(InterludeError::SessionNotFound(_)) => {
            assert!(matches!(outcome, Err(InterludeError::Timeout(_))))
        }
        Err(e) => panic!("unexpected submit error: {}", e),
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut terminal = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event.event_type,
            EventType::SessionCompleted { .. } | EventType::SessionTimedOut { .. }
        ) {
            terminal += 1;
        }
    }
    assert_eq!(terminal, 1);
    assert_eq!(broker.pending_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_not_extended_by_reprocess() {
    let broker = test_broker(
        Arc::new(EchoEnhancer::default()),
        Duration::from_millis(100),
    );
    let id = create_session(&broker).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    broker.reprocess(id, "v2".to_string()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!broker.store().contains(id).await);
}

#[tokio::test]
async fn test_reprocess_then_submit_result() {
    let enhancer = Arc::new(EchoEnhancer::default());
    let broker = test_broker(enhancer.clone(), Duration::from_secs(60));
    let id = create_session(&broker).await;
    let waiter = spawn_waiter(&broker, id);
    settle().await;

    let revised = broker.reprocess(id, "v2".to_string()).await.unwrap();
    assert_eq!(revised, "enhanced: v2");
    assert_eq!(
        broker.snapshot(id).await.unwrap().current_content,
        "enhanced: v2"
    );
    assert_eq!(enhancer.calls.load(Ordering::SeqCst), 1);

    broker.submit(id, revised.clone()).await.unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), Outcome::Edited(revised));
}

#[tokio::test]
async fn test_reprocess_failure_keeps_session_pending() {
    let broker = test_broker(Arc::new(FailingEnhancer), Duration::from_secs(60));
    let id = create_session(&broker).await;

    let err = broker.reprocess(id, "v2".to_string()).await.unwrap_err();
    assert!(matches!(err, InterludeError::ComputationFailed(_)));
    assert!(err.is_retriable());

    let snapshot = broker.snapshot(id).await.unwrap();
    assert_eq!(snapshot.current_content, "draft");
    assert_eq!(snapshot.status, SessionStatus::Pending);

    // Reviewer falls back to submitting by hand
    broker.submit(id, "manual edit".to_string()).await.unwrap();
}

#[tokio::test]
async fn test_reprocess_after_resolution_rejected() {
    let broker = echo_broker();
    let id = create_session(&broker).await;
    broker.submit(id, "done".to_string()).await.unwrap();

    assert!(matches!(
        broker.reprocess(id, "v2".to_string()).await,
        Err(InterludeError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_submit_wins_over_inflight_reprocess() {
    let enhancer = Arc::new(GatedEnhancer::default());
    let broker = test_broker(enhancer.clone(), Duration::from_secs(60));
    let id = create_session(&broker).await;
    let waiter = spawn_waiter(&broker, id);

    let reprocess = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.reprocess(id, "v2".to_string()).await })
    };
    enhancer.entered.notified().await;

    broker.submit(id, "final".to_string()).await.unwrap();
    enhancer.release.notify_one();

    assert!(matches!(
        reprocess.await.unwrap(),
        Err(InterludeError::SessionResolved(_))
    ));
    assert_eq!(
        waiter.await.unwrap().unwrap(),
        Outcome::Edited("final".to_string())
    );
}

#[tokio::test]
async fn test_all_waiters_see_same_outcome() {
    let broker = echo_broker();
    let id = create_session(&broker).await;
    let waiters: Vec<_> = (0..5).map(|_| spawn_waiter(&broker, id)).collect();
    settle().await;

    broker.submit(id, "shared".to_string()).await.unwrap();

    for waiter in waiters {
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            Outcome::Edited("shared".to_string())
        );
    }
}

#[tokio::test]
async fn test_second_submit_rejected() {
    let broker = echo_broker();
    let id = create_session(&broker).await;

    let slot = broker.store().get(id).await.unwrap();
    broker.submit(id, "first".to_string()).await.unwrap();

    // A caller that fetched the slot before removal still loses the race
    assert!(slot.complete("second".to_string()).await.is_none());
    assert!(matches!(
        broker.submit(id, "second".to_string()).await,
        Err(InterludeError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_open_observes_resolution_before_wait() {
    let broker = echo_broker();
    let review = broker
        .open("draft".into(), "orig".into(), String::new(), vec![])
        .await
        .unwrap();

    broker.submit(review.id(), "quick".to_string()).await.unwrap();

    assert_eq!(
        review.wait().await.unwrap(),
        Outcome::Edited("quick".to_string())
    );
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let broker = echo_broker();
    let a = create_session(&broker).await;
    let b = create_session(&broker).await;
    assert_ne!(a, b);

    let waiter_a = spawn_waiter(&broker, a);
    settle().await;

    broker.submit(b, "b done".to_string()).await.unwrap();
    settle().await;
    assert!(!waiter_a.is_finished());
    assert_eq!(broker.pending_count().await, 1);

    broker.submit(a, "a done".to_string()).await.unwrap();
    assert_eq!(
        waiter_a.await.unwrap().unwrap(),
        Outcome::Edited("a done".to_string())
    );
}

#[tokio::test]
async fn test_await_unknown_session() {
    let broker = echo_broker();
    assert!(matches!(
        broker.await_completion(SessionId::new()).await,
        Err(InterludeError::SessionNotFound(_))
    ));
}
