//! Callback Handler module for inline keyboard interactions

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::dialogue::{BotDialogue, ConversationState};
use crate::localization::{t_lang, SUPPORTED_LANGUAGES};

use super::compile_flow::run_compilation;
use super::dialogue_manager::{admin_access, AdminAccess};
use super::ui_builder::{admin_keyboard, base_reply_keyboard, format_stats};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<()> {
    let user_id = q.from.id.0;
    let (chat_id, message_id) = match q.message.as_ref() {
        Some(message) => (message.chat().id, message.id()),
        None => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };
    let data = q.data.as_deref().unwrap_or_default().to_string();

    if let Some(code) = data.strip_prefix("lang_") {
        handle_language_selection(&bot, chat_id, message_id, user_id, &ctx, code).await?;
    } else if data == "filename_yes" {
        let language = ctx.users.language_of(user_id).await;
        bot.edit_message_text(chat_id, message_id, t_lang("enter-filename", &language))
            .await?;
        dialogue
            .update(ConversationState::AwaitingFilenameText)
            .await?;
    } else if data == "filename_no" {
        let language = ctx.users.language_of(user_id).await;
        bot.delete_message(chat_id, message_id).await.ok();
        run_compilation(&bot, chat_id, user_id, &ctx, &dialogue, None, &language).await?;
    } else if let Some(action) = data.strip_prefix("admin_") {
        handle_admin_action(&bot, chat_id, message_id, user_id, &ctx, &dialogue, action).await?;
    } else {
        debug!(user_id, data = %data, "unrecognised callback");
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

/// Persist the chosen language and confirm in it.
async fn handle_language_selection(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    user_id: u64,
    ctx: &Arc<AppContext>,
    code: &str,
) -> Result<()> {
    if !SUPPORTED_LANGUAGES.contains(&code) {
        debug!(user_id, code, "unsupported language selected");
        return Ok(());
    }
    ctx.users.set_language(user_id, code).await?;
    info!(user_id, language = code, "language changed");
    bot.edit_message_text(chat_id, message_id, t_lang("lang-selected", code))
        .await?;
    bot.send_message(chat_id, t_lang("instruction-initial", code))
        .reply_markup(base_reply_keyboard(code))
        .await?;
    Ok(())
}

/// Admin panel actions. Anyone but the configured administrator is ignored
/// without feedback.
async fn handle_admin_action(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    user_id: u64,
    ctx: &Arc<AppContext>,
    dialogue: &BotDialogue,
    action: &str,
) -> Result<()> {
    if admin_access(user_id, ctx.config.admin_id) == AdminAccess::SilentlyRefused {
        debug!(user_id, action, "non-admin pressed an admin button");
        return Ok(());
    }
    let language = ctx.users.language_of(user_id).await;
    match action {
        "broadcast" => {
            bot.edit_message_text(chat_id, message_id, t_lang("admin-enter-broadcast", &language))
                .await?;
            dialogue
                .update(ConversationState::AdminAwaitingBroadcastText)
                .await?;
        }
        "forward" => {
            bot.edit_message_text(chat_id, message_id, t_lang("admin-choose-forward", &language))
                .await?;
            dialogue
                .update(ConversationState::AdminAwaitingForwardTarget)
                .await?;
        }
        "stats" => {
            let stats = ctx.stats.load().await;
            let user_ids = ctx.users.all_user_ids().await;
            let language_counts = ctx.users.language_counts().await;
            let text = format_stats(&stats, user_ids.len(), &language_counts, &language);
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(admin_keyboard(&language))
                .await?;
        }
        "cancel" => {
            bot.edit_message_text(chat_id, message_id, t_lang("admin-closed", &language))
                .await?;
            // Return to collecting when a session survived the detour.
            let next = if ctx.sessions.is_active(user_id).await {
                ConversationState::Collecting
            } else {
                ConversationState::Inactive
            };
            dialogue.update(next).await?;
        }
        _ => debug!(user_id, action, "unrecognised admin action"),
    }
    Ok(())
}
