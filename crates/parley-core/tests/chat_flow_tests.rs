mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{reply_to, MockBackend, VALID_EMAIL, VALID_PASSWORD};
use parley_core::{
    guard, AuthFlow, ChatController, ClientError, Message, Route, SendStage, SessionGuard,
    Outcome, SessionStore, Task, Work, PLACEHOLDER_TITLE,
};

struct Harness {
    mock: Arc<MockBackend>,
    session: SessionStore,
    auth: AuthFlow,
    controller: ChatController,
}

fn harness(mock: MockBackend) -> Harness {
    let mock = Arc::new(mock);
    let session = SessionStore::in_memory();
    let backend = SessionGuard::shared(Arc::clone(&mock), session.clone());
    Harness {
        auth: AuthFlow::new(Arc::clone(&backend), session.clone()),
        controller: ChatController::new(backend, session.clone()),
        mock,
        session,
    }
}

async fn logged_in(mock: MockBackend) -> Harness {
    let h = harness(mock);
    h.auth.login(VALID_EMAIL, VALID_PASSWORD).await.unwrap();
    h
}

#[tokio::test]
async fn test_login_sets_token_and_opens_chat() {
    let h = harness(MockBackend::new());
    assert_eq!(guard(Route::Chat, &h.session), Route::Login);

    let session = h.auth.login(VALID_EMAIL, VALID_PASSWORD).await.unwrap();
    assert!(session.is_authenticated());
    assert!(h.session.get().is_some());
    assert_eq!(guard(Route::Login, &h.session), Route::Chat);
    assert_eq!(guard(Route::Register, &h.session), Route::Chat);

    h.auth.logout();
    assert_eq!(guard(Route::Chat, &h.session), Route::Login);
}

#[tokio::test]
async fn test_login_failure_leaves_session_alone() {
    let h = harness(MockBackend::new());

    let err = h.auth.login(VALID_EMAIL, "wrong").await.unwrap_err();
    assert_eq!(err, ClientError::InvalidCredentials);
    assert!(!h.session.is_authenticated());

    h.mock.set_network_down(true);
    let err = h.auth.login(VALID_EMAIL, VALID_PASSWORD).await.unwrap_err();
    assert!(matches!(err, ClientError::NetworkFailure(_)));
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn test_blank_credentials_never_reach_backend() {
    let h = harness(MockBackend::new());

    assert_eq!(
        h.auth.login("  ", "pw").await.unwrap_err(),
        ClientError::InvalidCredentials
    );
    assert_eq!(
        h.auth.register("new@example.com", "").await.unwrap_err(),
        ClientError::RegistrationFailed
    );
    assert_eq!(h.mock.total_calls(), 0);
}

#[tokio::test]
async fn test_register_does_not_log_in() {
    let h = harness(MockBackend::new());

    let result = h.auth.register("grace@example.com", "hopper").await.unwrap();
    assert!(!result.message.is_empty());
    assert!(!h.session.is_authenticated());

    let err = h.auth.register("grace@example.com", "again").await.unwrap_err();
    assert_eq!(err, ClientError::RegistrationFailed);

    h.auth.login("grace@example.com", "hopper").await.unwrap();
    assert!(h.session.is_authenticated());
}

#[tokio::test]
async fn test_load_all_opens_first_conversation() {
    let history = vec![Message::user("hi"), Message::assistant("hello")];
    let mut h = logged_in(
        MockBackend::new()
            .with_conversation("a", Some("First"), history.clone())
            .with_conversation("b", None, Vec::new()),
    )
    .await;

    h.controller.load_all().await.unwrap();

    assert!(h.controller.is_loaded());
    assert!(!h.controller.is_loading_conversations());
    assert_eq!(h.controller.registry().len(), 2);
    assert_eq!(h.controller.current(), Some("a"));
    assert_eq!(h.controller.messages(), history.as_slice());
    assert_eq!(
        h.controller.registry().get("b").unwrap().title,
        PLACEHOLDER_TITLE
    );
    assert!(h.controller.registry().get("b").unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_reload_keeps_selection_inside_registry() {
    let mut h = logged_in(
        MockBackend::new()
            .with_conversation("a", Some("A"), Vec::new())
            .with_conversation("b", Some("B"), vec![Message::user("in b")]),
    )
    .await;
    h.controller.load_all().await.unwrap();
    h.controller.select_and_load(Some("b")).await.unwrap();
    assert_eq!(h.controller.current(), Some("b"));

    // Still present: kept, and its history is fetched again
    h.controller.load_all().await.unwrap();
    assert_eq!(h.controller.current(), Some("b"));
    assert_eq!(h.controller.messages(), &[Message::user("in b")]);

    // Gone: selection falls back to the first remaining conversation
    h.mock.remove_conversation("b");
    h.controller.load_all().await.unwrap();
    assert_eq!(h.controller.current(), Some("a"));
    if let Some(id) = h.controller.current() {
        assert!(h.controller.registry().contains(id));
    }

    h.mock.remove_conversation("a");
    h.controller.load_all().await.unwrap();
    assert_eq!(h.controller.current(), None);
    assert!(h.controller.messages().is_empty());
}

#[tokio::test]
async fn test_select_unknown_conversation_is_refused() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();

    let err = h.controller.select(Some("ghost")).unwrap_err();
    assert_eq!(err, ClientError::UnknownConversation("ghost".to_string()));
    assert_eq!(h.controller.current(), Some("a"));
}

#[tokio::test]
async fn test_reselect_does_not_refetch() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    let fetched = h.mock.history_calls.load(Ordering::SeqCst);

    assert_eq!(h.controller.select(Some("a")).unwrap(), None);
    h.controller.select_and_load(Some("a")).await.unwrap();
    assert_eq!(h.mock.history_calls.load(Ordering::SeqCst), fetched);

    assert_eq!(h.controller.select(None).unwrap(), None);
    assert_eq!(h.controller.current(), None);
    assert!(h.controller.messages().is_empty());
}

#[tokio::test]
async fn test_new_chat_from_empty_account() {
    let mut h = logged_in(MockBackend::new()).await;
    h.controller.load_all().await.unwrap();
    assert!(h.controller.registry().is_empty());
    assert_eq!(h.controller.current(), None);

    let id = h.controller.create().await.unwrap();

    assert_eq!(h.controller.registry().len(), 1);
    let created = h.controller.registry().get(&id).unwrap();
    assert_eq!(created.title, PLACEHOLDER_TITLE);
    assert!(created.messages.is_empty());
    assert_eq!(h.controller.current(), Some(id.as_str()));
    assert!(h.controller.messages().is_empty());
    assert_eq!(h.mock.history_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_new_chat_leaves_other_conversations() {
    let history = vec![Message::user("old")];
    let mut h = logged_in(MockBackend::new().with_conversation("a", Some("A"), history.clone())).await;
    h.controller.load_all().await.unwrap();

    let id = h.controller.create().await.unwrap();
    assert_ne!(id, "a");
    assert_eq!(h.controller.registry().len(), 2);
    assert_eq!(h.controller.registry().get("a").unwrap().messages, history);
    assert_eq!(h.controller.registry().first_id(), Some(id.as_str()));
}

#[tokio::test]
async fn test_blank_send_is_a_no_op() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    let calls = h.mock.total_calls();

    for text in ["", "   ", "\n\t"] {
        assert!(h.controller.begin_send(text).is_none());
        h.controller.send(text).await.unwrap();
    }

    assert_eq!(h.mock.total_calls(), calls);
    assert!(h.controller.messages().is_empty());
    assert!(!h.controller.is_loading());
}

#[tokio::test]
async fn test_send_without_active_conversation_is_a_no_op() {
    let mut h = logged_in(MockBackend::new()).await;
    h.controller.load_all().await.unwrap();
    let calls = h.mock.total_calls();

    assert!(h.controller.begin_send("hello").is_none());
    assert_eq!(h.mock.total_calls(), calls);
}

#[tokio::test]
async fn test_send_hello_reconciles_to_server_history() {
    let mut h = logged_in(MockBackend::new()).await;
    h.controller.load_all().await.unwrap();
    let id = h.controller.create().await.unwrap();

    h.controller.send("hello").await.unwrap();

    assert_eq!(
        h.controller.messages(),
        &[Message::user("hello"), Message::assistant(reply_to("hello"))]
    );
    assert_eq!(h.controller.messages(), h.mock.history_of(&id).as_slice());
    assert!(!h.controller.is_loading());
    assert!(h.controller.notice().is_none());

    // Fetching again with no writes in between changes nothing
    let before = h.controller.messages().to_vec();
    let result = Task::new(h.controller.epoch(), Work::FetchHistory(id.clone()))
        .run(h.controller.backend())
        .await;
    assert_eq!(h.controller.apply(result).unwrap(), None);
    assert_eq!(h.controller.messages(), before.as_slice());
}

#[tokio::test]
async fn test_reconciliation_replaces_rather_than_merges() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();

    // Another client wrote first; the local view has never seen it
    h.mock.push_server_message("a", Message::user("from elsewhere"));
    h.mock
        .push_server_message("a", Message::assistant("reply elsewhere"));

    h.controller.send("mine").await.unwrap();
    assert_eq!(h.controller.messages(), h.mock.history_of("a").as_slice());
    assert_eq!(h.controller.messages().len(), 4);
}

#[tokio::test]
async fn test_optimistic_message_is_visible_before_dispatch() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();

    let task = h.controller.begin_send("quick").unwrap();
    assert!(h.controller.is_loading());
    assert_eq!(h.controller.messages(), &[Message::user("quick")]);
    assert_eq!(h.mock.send_calls.load(Ordering::SeqCst), 0);

    let result = task.run(h.controller.backend()).await;
    h.controller.apply(result).unwrap();
    assert!(!h.controller.is_loading());
    assert_eq!(h.controller.messages().len(), 2);
}

#[tokio::test]
async fn test_reconciliation_failure_keeps_optimistic_message() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    h.mock.set_fail_history(true);

    let err = h.controller.send("hello").await.unwrap_err();

    match err {
        ClientError::SendFailed { stage, .. } => assert_eq!(stage, SendStage::Reconcile),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.controller.messages(), &[Message::user("hello")]);
    assert!(h.controller.notice().is_some());
    assert!(!h.controller.is_loading());
    assert!(h.session.is_authenticated());

    h.controller.dismiss_notice();
    assert!(h.controller.notice().is_none());
}

#[tokio::test]
async fn test_dispatch_failure_keeps_optimistic_message() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    h.mock.set_fail_send(true);

    let err = h.controller.send("hello").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::SendFailed {
            stage: SendStage::Dispatch,
            ..
        }
    ));
    assert_eq!(h.controller.messages(), &[Message::user("hello")]);
    assert_eq!(h.mock.history_calls.load(Ordering::SeqCst), 0);
    assert!(!h.controller.is_loading());
}

#[tokio::test]
async fn test_rejected_token_clears_session() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    let watcher = h.session.subscribe();

    h.mock.revoke_token();
    let err = h.controller.send("hello").await.unwrap_err();

    assert_eq!(err, ClientError::Unauthenticated);
    assert!(!h.session.is_authenticated());
    assert!(watcher.has_changed().unwrap());
    assert_eq!(guard(Route::Chat, &h.session), Route::Login);
    // Session expiry routes away instead of raising a notification
    assert!(h.controller.notice().is_none());

    let err = h.controller.load_all().await.unwrap_err();
    assert_eq!(err, ClientError::Unauthenticated);
}

#[tokio::test]
async fn test_load_failure_is_reported() {
    let mut h = logged_in(MockBackend::new()).await;
    h.mock.set_network_down(true);

    let err = h.controller.load_all().await.unwrap_err();
    assert!(matches!(err, ClientError::NetworkFailure(_)));
    assert!(h.controller.is_loaded());
    assert!(!h.controller.is_loading_conversations());
    assert!(h.controller.notice().is_some());
    assert!(h.session.is_authenticated());
}

#[tokio::test]
async fn test_stale_reconciliation_does_not_touch_other_conversation() {
    let mut h = logged_in(
        MockBackend::new()
            .with_conversation("a", None, Vec::new())
            .with_conversation("b", None, vec![Message::user("b history")]),
    )
    .await;
    h.controller.load_all().await.unwrap();
    assert_eq!(h.controller.current(), Some("a"));

    let send = h.controller.begin_send("for a").unwrap();

    // User moves to b while the send is in flight
    h.controller.select_and_load(Some("b")).await.unwrap();
    assert_eq!(h.controller.messages(), &[Message::user("b history")]);

    let result = send.run(h.controller.backend()).await;
    h.controller.apply(result).unwrap();

    assert_eq!(h.controller.current(), Some("b"));
    assert_eq!(h.controller.messages(), &[Message::user("b history")]);
    assert!(!h.controller.is_loading());

    // Going back to a refetches instead of trusting the dropped result
    let refetch = h.controller.select(Some("a")).unwrap();
    assert_eq!(
        refetch.as_ref().map(|task| &task.work),
        Some(&Work::FetchHistory("a".to_string()))
    );
    h.controller.run(refetch.unwrap()).await.unwrap();
    assert_eq!(h.controller.messages(), h.mock.history_of("a").as_slice());
    assert_eq!(h.controller.messages().len(), 2);
}

#[tokio::test]
async fn test_last_reconciliation_to_resolve_wins() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();

    let first = h.controller.begin_send("one").unwrap();
    let second = h.controller.begin_send("two").unwrap();
    assert_eq!(
        h.controller.messages(),
        &[Message::user("one"), Message::user("two")]
    );

    let backend = h.controller.backend();
    let first_result = first.run(Arc::clone(&backend)).await;
    let second_result = second.run(backend).await;

    // Resolve out of order: the older snapshot lands last
    h.controller.apply(second_result).unwrap();
    assert!(h.controller.is_loading());
    assert_eq!(h.controller.messages().len(), 4);

    h.controller.apply(first_result).unwrap();
    assert!(!h.controller.is_loading());
    assert_eq!(
        h.controller.messages(),
        &[Message::user("one"), Message::assistant(reply_to("one"))]
    );

    // The next authoritative fetch heals the view
    let result = Task::new(h.controller.epoch(), Work::FetchHistory("a".to_string()))
        .run(h.controller.backend())
        .await;
    h.controller.apply(result).unwrap();
    assert_eq!(h.controller.messages(), h.mock.history_of("a").as_slice());
}

#[tokio::test]
async fn test_reset_forgets_previous_session_state() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();
    h.auth.logout();

    h.controller.reset();
    assert!(h.controller.registry().is_empty());
    assert_eq!(h.controller.current(), None);
    assert!(!h.controller.is_loaded());
}

#[tokio::test]
async fn test_results_from_previous_session_are_ignored() {
    let mut h = logged_in(MockBackend::new().with_conversation("a", None, Vec::new())).await;
    h.controller.load_all().await.unwrap();

    // Work started under the first session
    let old_send = h.controller.begin_send("before logout").unwrap();
    let old_create = h.controller.begin_create();
    let backend = h.controller.backend();
    let old_sent = old_send.run(Arc::clone(&backend)).await;
    let old_created = old_create.run(backend).await;
    let Outcome::ConversationCreated(Ok(old_id)) = &old_created.outcome else {
        panic!("create failed: {:?}", old_created);
    };
    let old_id = old_id.clone();
    // The next account's server does not know about it
    h.mock.remove_conversation(&old_id);

    h.auth.logout();
    h.controller.reset();
    h.auth.login(VALID_EMAIL, VALID_PASSWORD).await.unwrap();
    h.controller.load_all().await.unwrap();
    let new_send = h.controller.begin_send("after login").unwrap();
    assert!(h.controller.is_loading());

    assert_eq!(h.controller.apply(old_sent).unwrap(), None);
    assert!(h.controller.is_loading());

    assert_eq!(h.controller.apply(old_created).unwrap(), None);
    assert!(!h.controller.registry().contains(&old_id));
    assert_eq!(h.controller.current(), Some("a"));

    let result = new_send.run(h.controller.backend()).await;
    h.controller.apply(result).unwrap();
    assert!(!h.controller.is_loading());
    assert_eq!(h.controller.messages(), h.mock.history_of("a").as_slice());
}

#[tokio::test]
async fn test_reset_advances_epoch_for_new_tasks() {
    let mut h = logged_in(MockBackend::new()).await;
    let before = h.controller.begin_load();
    h.controller.reset();
    let after = h.controller.begin_load();

    assert_eq!(before.work, after.work);
    assert_ne!(before.epoch, after.epoch);
    assert_eq!(after.epoch, h.controller.epoch());
}
