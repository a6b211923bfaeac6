//! Conversation state machine for the accumulation and admin flows.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Conversation state, one active state per chat.
///
/// `Inactive` is the terminal "no active session" condition: the default
/// before `/start` and the only state reachable via `/cancel`. The admin
/// states form a disjoint sub-machine entered through `/admin`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Inactive,
    Collecting,
    AwaitingFilenameDecision,
    AwaitingFilenameText,
    AdminMenu,
    AdminAwaitingBroadcastText,
    AdminAwaitingForwardTarget,
}

/// Type alias for the bot dialogue.
pub type BotDialogue = Dialogue<ConversationState, InMemStorage<ConversationState>>;

/// Extension given to every compiled document.
pub const OUTPUT_EXTENSION: &str = ".pdf";

/// Normalize the user-supplied output filename.
///
/// No name yields a timestamped default; a name without the expected
/// extension gets it appended. Nothing beyond extension handling is changed:
/// the result is only ever used as a Telegram attachment name.
pub fn normalize_filename(input: Option<&str>) -> String {
    match input.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if name.to_lowercase().ends_with(OUTPUT_EXTENSION) => name.to_string(),
        Some(name) => format!("{name}{OUTPUT_EXTENSION}"),
        None => format!(
            "combined_{}{}",
            chrono::Local::now().format("%Y%m%d%H%M%S"),
            OUTPUT_EXTENSION
        ),
    }
}
