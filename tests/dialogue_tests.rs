//! Tests for the conversation state machine, routing guards, and filename
//! handling.

use pagebinder::bot::dialogue_manager::{
    admin_access, gate_compilation, within_size_cap, AdminAccess, CompileGate,
};
use pagebinder::dialogue::{normalize_filename, ConversationState};
use pagebinder::session::{ContentItem, SessionManager};

#[test]
fn default_state_is_inactive() {
    assert_eq!(ConversationState::default(), ConversationState::Inactive);
}

#[test]
fn state_survives_serde_round_trip() {
    // InMemStorage clones states around, and the serde derives keep the door
    // open for a persistent storage backend.
    for state in [
        ConversationState::Inactive,
        ConversationState::Collecting,
        ConversationState::AwaitingFilenameDecision,
        ConversationState::AwaitingFilenameText,
        ConversationState::AdminMenu,
        ConversationState::AdminAwaitingBroadcastText,
        ConversationState::AdminAwaitingForwardTarget,
    ] {
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}

#[test]
fn chosen_name_gets_the_extension_appended() {
    assert_eq!(normalize_filename(Some("notes")), "notes.pdf");
    assert_eq!(normalize_filename(Some("notes.PDF")), "notes.PDF");
}

#[test]
fn missing_name_falls_back_to_timestamp() {
    let name = normalize_filename(None);
    assert!(name.starts_with("combined_"));
    assert!(name.ends_with(".pdf"));
}

#[tokio::test]
async fn compile_without_session_is_gated_out() {
    let sessions = SessionManager::new();
    assert_eq!(
        gate_compilation(sessions.snapshot(1).await),
        CompileGate::NoSession
    );
}

#[tokio::test]
async fn compile_on_empty_queue_short_circuits() {
    let sessions = SessionManager::new();
    sessions.start(1).await;
    // The pipeline is only reachable through the Run arm, so an empty queue
    // never invokes it.
    assert_eq!(
        gate_compilation(sessions.snapshot(1).await),
        CompileGate::NoItems
    );
}

#[tokio::test]
async fn size_cap_rejection_leaves_items_queued() {
    let sessions = SessionManager::new();
    sessions.start(1).await;
    for text in ["one", "two"] {
        sessions
            .append(
                1,
                ContentItem::Text {
                    content: text.to_string(),
                },
            )
            .await
            .unwrap();
    }

    let gate = gate_compilation(sessions.snapshot(1).await);
    assert!(matches!(gate, CompileGate::Run(ref items) if items.len() == 2));

    // An oversized result is rejected before delivery, and because the gate
    // worked from a snapshot the queue is untouched for the retry.
    assert!(!within_size_cap(100, 50));
    assert_eq!(sessions.snapshot(1).await.unwrap().len(), 2);

    assert!(within_size_cap(50, 50));
}

#[test]
fn admin_access_requires_exact_identity() {
    assert_eq!(admin_access(42, 42), AdminAccess::Granted);
    assert_eq!(admin_access(41, 42), AdminAccess::SilentlyRefused);
    assert_eq!(admin_access(0, 42), AdminAccess::SilentlyRefused);
}
