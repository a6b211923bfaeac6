//! Compilation flow: runs the render-and-merge pipeline off the event path
//! and delivers the result.

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use crate::compile;
use crate::context::AppContext;
use crate::dialogue::{normalize_filename, BotDialogue, ConversationState};
use crate::localization::t_lang;
use crate::store::StatAction;

use super::dialogue_manager::{gate_compilation, within_size_cap, CompileGate};
use super::ui_builder::{base_reply_keyboard, collecting_reply_keyboard};

/// Compile the user's accumulated items and send the resulting document.
///
/// The pipeline runs on the blocking pool so other users' events keep
/// flowing. An hourglass indicator message is sent up front and removed by a
/// dedicated task once a one-shot completion signal fires; the signal is sent
/// exactly once, whether compilation succeeds or fails.
pub async fn run_compilation(
    bot: &Bot,
    chat_id: ChatId,
    user_id: u64,
    ctx: &Arc<AppContext>,
    dialogue: &BotDialogue,
    file_name: Option<String>,
    language: &str,
) -> Result<()> {
    let items = match gate_compilation(ctx.sessions.snapshot(user_id).await) {
        CompileGate::NoSession => {
            warn!(user_id, "compilation requested without a session");
            bot.send_message(chat_id, t_lang("session-required", language))
                .await?;
            dialogue.update(ConversationState::Inactive).await?;
            return Ok(());
        }
        CompileGate::NoItems => {
            bot.send_message(chat_id, t_lang("no-items-error", language))
                .await?;
            dialogue.update(ConversationState::Collecting).await?;
            return Ok(());
        }
        CompileGate::Run(items) => items,
    };

    let loading = bot.send_message(chat_id, "⌛").await?;
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let indicator = {
        let bot = bot.clone();
        let loading_id = loading.id;
        tokio::spawn(async move {
            let _ = done_rx.await;
            if let Err(e) = bot.delete_message(chat_id, loading_id).await {
                warn!(error = %e, "failed to delete progress indicator");
            }
        })
    };

    let item_count = items.len();
    let compiled = tokio::task::spawn_blocking(move || compile::compile_items(&items)).await;
    let _ = done_tx.send(());
    let _ = indicator.await;

    let document = match compiled {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => {
            error!(user_id, error = %e, "document generation failed");
            bot.send_message(chat_id, t_lang("generation-failed", language))
                .await?;
            dialogue.update(ConversationState::Collecting).await?;
            return Ok(());
        }
        Err(e) => {
            error!(user_id, error = %e, "compilation task panicked");
            bot.send_message(chat_id, t_lang("generation-failed", language))
                .await?;
            dialogue.update(ConversationState::Collecting).await?;
            return Ok(());
        }
    };

    if !within_size_cap(document.len(), ctx.config.max_document_size) {
        // Items stay queued so the user can remove some and retry.
        warn!(
            user_id,
            size = document.len(),
            "compiled document exceeds the size cap"
        );
        bot.send_message(chat_id, t_lang("document-too-large", language))
            .await?;
        dialogue.update(ConversationState::Collecting).await?;
        return Ok(());
    }

    let name = normalize_filename(file_name.as_deref());
    info!(
        user_id,
        items = item_count,
        size = document.len(),
        file_name = %name,
        "compiled document ready"
    );

    bot.send_document(chat_id, InputFile::memory(document).file_name(name))
        .caption(t_lang("document-ready", language))
        .await?;
    ctx.stats.record(StatAction::Document).await?;

    // Successful compilation empties the queue; the session itself survives.
    let drained = ctx.sessions.drain(user_id).await.unwrap_or_default();
    debug!(user_id, drained = drained.len(), "item queue emptied");
    let _ = ctx.sessions.set_hint_shown(user_id, false).await;

    bot.send_message(chat_id, t_lang("instruction-initial", language))
        .reply_markup(base_reply_keyboard(language))
        .await?;
    dialogue.update(ConversationState::Collecting).await?;
    Ok(())
}

/// Send the once-per-session hint explaining the compile button, the first
/// time an item lands in the queue.
pub async fn send_accumulation_hint(
    bot: &Bot,
    chat_id: ChatId,
    user_id: u64,
    ctx: &Arc<AppContext>,
    language: &str,
) -> Result<()> {
    if ctx.sessions.hint_shown(user_id).await.unwrap_or(true) {
        return Ok(());
    }
    bot.send_message(chat_id, t_lang("instruction-accumulated", language))
        .reply_markup(collecting_reply_keyboard(language))
        .await?;
    let _ = ctx.sessions.set_hint_shown(user_id, true).await;
    Ok(())
}
