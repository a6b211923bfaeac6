//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::convert;
use crate::dialogue::{BotDialogue, ConversationState};
use crate::localization::{t_args_lang, t_lang};
use crate::session::ContentItem;
use crate::store::StatAction;

use super::compile_flow::{run_compilation, send_accumulation_hint};
use super::dialogue_manager::{admin_access, AdminAccess};
use super::ui_builder::{admin_keyboard, language_keyboard};

/// Download a Telegram file into memory.
pub async fn download_file_bytes(bot: &Bot, file_id: FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    ctx: Arc<AppContext>,
    dialogue: BotDialogue,
) -> Result<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user.clone(),
        None => return Ok(()),
    };
    let user_id = user.id.0;
    let language = ctx.users.language_of(user_id).await;

    // Commands work from every state.
    if let Some(text) = msg.text() {
        match text {
            "/start" => return handle_start(&bot, &msg, user_id, &ctx, &dialogue, &language).await,
            "/cancel" => {
                return handle_cancel(&bot, &msg, user_id, &ctx, &dialogue, &language).await
            }
            "/help" => {
                bot.send_message(msg.chat.id, t_lang("help-text", &language))
                    .await?;
                return Ok(());
            }
            "/admin" => {
                if admin_access(user_id, ctx.config.admin_id) == AdminAccess::SilentlyRefused {
                    debug!(user_id, "non-admin attempted /admin");
                    return Ok(());
                }
                bot.send_message(msg.chat.id, t_lang("admin-panel-title", &language))
                    .reply_markup(admin_keyboard(&language))
                    .await?;
                dialogue.update(ConversationState::AdminMenu).await?;
                return Ok(());
            }
            _ => {}
        }
    }

    match dialogue.get_or_default().await? {
        ConversationState::Inactive => {
            bot.send_message(msg.chat.id, t_lang("session-required", &language))
                .await?;
        }
        ConversationState::Collecting => {
            handle_collecting(&bot, &msg, user_id, &ctx, &dialogue, &language).await?;
        }
        ConversationState::AwaitingFilenameDecision | ConversationState::AwaitingFilenameText => {
            // Typed text is accepted as the filename even while the yes/no
            // keyboard is still pending.
            if let Some(text) = msg.text() {
                let name = text.trim().to_string();
                run_compilation(
                    &bot,
                    msg.chat.id,
                    user_id,
                    &ctx,
                    &dialogue,
                    Some(name),
                    &language,
                )
                .await?;
            } else {
                bot.send_message(msg.chat.id, t_lang("enter-filename", &language))
                    .await?;
            }
        }
        ConversationState::AdminMenu => {
            debug!(user_id, "message ignored while admin menu is open");
        }
        ConversationState::AdminAwaitingBroadcastText => {
            if admin_access(user_id, ctx.config.admin_id) == AdminAccess::SilentlyRefused {
                return Ok(());
            }
            if let Some(text) = msg.text() {
                handle_broadcast(&bot, &msg, &ctx, text, &language).await?;
                dialogue.update(ConversationState::AdminMenu).await?;
            }
        }
        ConversationState::AdminAwaitingForwardTarget => {
            if admin_access(user_id, ctx.config.admin_id) == AdminAccess::SilentlyRefused {
                return Ok(());
            }
            handle_forward(&bot, &msg, &ctx, &language).await?;
            dialogue.update(ConversationState::AdminMenu).await?;
        }
    }

    Ok(())
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    dialogue: &BotDialogue,
    language: &str,
) -> Result<()> {
    info!(user_id, "session started");
    ctx.sessions.start(user_id).await;
    ctx.stats.record(StatAction::Other).await?;
    bot.send_message(msg.chat.id, t_lang("welcome", language))
        .reply_markup(language_keyboard())
        .await?;
    dialogue.update(ConversationState::Collecting).await?;
    Ok(())
}

async fn handle_cancel(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    dialogue: &BotDialogue,
    language: &str,
) -> Result<()> {
    info!(user_id, "session cancelled");
    ctx.sessions.end(user_id).await;
    dialogue.update(ConversationState::Inactive).await?;
    bot.send_message(msg.chat.id, t_lang("cancelled", language))
        .await?;
    Ok(())
}

/// Route an inbound message while collecting: menu actions by their localized
/// labels, anything else becomes a content item.
async fn handle_collecting(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    dialogue: &BotDialogue,
    language: &str,
) -> Result<()> {
    if let Some(text) = msg.text() {
        let trimmed = text.trim();
        if trimmed == t_lang("btn-compile", language) {
            bot.send_message(msg.chat.id, t_lang("ask-filename", language))
                .reply_markup(super::ui_builder::filename_keyboard(language))
                .await?;
            dialogue
                .update(ConversationState::AwaitingFilenameDecision)
                .await?;
            return Ok(());
        }
        if trimmed == t_lang("btn-change-lang", language) {
            bot.send_message(msg.chat.id, t_lang("choose-language", language))
                .reply_markup(language_keyboard())
                .await?;
            return Ok(());
        }
        if trimmed == t_lang("btn-help", language) {
            bot.send_message(msg.chat.id, t_lang("help-text", language))
                .await?;
            return Ok(());
        }
        let item = ContentItem::Text {
            content: text.to_string(),
        };
        accept_item(bot, msg, user_id, ctx, item, language).await?;
        return Ok(());
    }

    if let Some(photos) = msg.photo() {
        if let Some(largest) = photos.last() {
            if largest.file.size as u64 > ctx.config.max_item_size {
                bot.send_message(msg.chat.id, t_lang("item-too-large", language))
                    .await?;
                return Ok(());
            }
            match download_file_bytes(bot, largest.file.id.clone()).await {
                Ok(bytes) => {
                    let item = ContentItem::Image { content: bytes };
                    accept_item(bot, msg, user_id, ctx, item, language).await?;
                }
                Err(e) => {
                    error!(user_id, error = %e, "failed to download photo");
                    bot.send_message(msg.chat.id, t_lang("download-failed", language))
                        .await?;
                }
            }
        }
        return Ok(());
    }

    if msg.document().is_some() {
        handle_document_message(bot, msg, user_id, ctx, language).await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, t_lang("unsupported-item", language))
        .await?;
    Ok(())
}

/// Documents enter the queue as images or text: image documents directly,
/// PDFs rasterised page by page, office formats converted to PDF first.
async fn handle_document_message(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    language: &str,
) -> Result<()> {
    let doc = match msg.document() {
        Some(doc) => doc,
        None => return Ok(()),
    };
    if doc.file.size as u64 > ctx.config.max_item_size {
        bot.send_message(msg.chat.id, t_lang("item-too-large", language))
            .await?;
        return Ok(());
    }

    let file_name = doc.file_name.clone().unwrap_or_default();
    let mime = doc
        .mime_type
        .as_ref()
        .map(|mime| mime.to_string())
        .unwrap_or_default();

    let bytes = match download_file_bytes(bot, doc.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id, error = %e, "failed to download document");
            bot.send_message(msg.chat.id, t_lang("download-failed", language))
                .await?;
            return Ok(());
        }
    };

    if mime.starts_with("image/") {
        let item = ContentItem::Image { content: bytes };
        return accept_item(bot, msg, user_id, ctx, item, language).await;
    }

    let lower_name = file_name.to_lowercase();
    let pdf_bytes = if mime == "application/pdf" || lower_name.ends_with(".pdf") {
        Ok(bytes)
    } else if is_office_document(&lower_name) {
        convert::office_to_pdf(&bytes, &file_name, ctx.config.convert_timeout).await
    } else {
        bot.send_message(msg.chat.id, t_lang("unsupported-item", language))
            .await?;
        return Ok(());
    };

    match pdf_bytes {
        Ok(pdf) => match convert::pdf_to_page_images(pdf).await {
            Ok(pages) => {
                info!(user_id, pages = pages.len(), file_name = %file_name, "document split into page images");
                for page in pages {
                    let item = ContentItem::Image { content: page };
                    accept_item(bot, msg, user_id, ctx, item, language).await?;
                }
            }
            Err(e) => {
                warn!(user_id, error = %e, file_name = %file_name, "document rasterisation failed");
                append_failure_notice(bot, msg, user_id, ctx, &file_name, language).await?;
            }
        },
        Err(e) => {
            warn!(user_id, error = %e, file_name = %file_name, "office conversion failed");
            append_failure_notice(bot, msg, user_id, ctx, &file_name, language).await?;
        }
    }
    Ok(())
}

/// The adapter's failure notice enters the queue as a text item, so the
/// compiled document records which input could not be converted.
async fn append_failure_notice(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    file_name: &str,
    language: &str,
) -> Result<()> {
    let notice = t_args_lang("conversion-failed", &[("name", file_name)], language);
    bot.send_message(msg.chat.id, &notice).await?;
    let item = ContentItem::Text { content: notice };
    accept_item(bot, msg, user_id, ctx, item, language).await
}

/// Append an item to the user's queue, enforcing the per-item size cap, and
/// show the compile hint after the first accepted item.
async fn accept_item(
    bot: &Bot,
    msg: &Message,
    user_id: u64,
    ctx: &Arc<AppContext>,
    item: ContentItem,
    language: &str,
) -> Result<()> {
    if item.raw_size() as u64 > ctx.config.max_item_size {
        bot.send_message(msg.chat.id, t_lang("item-too-large", language))
            .await?;
        return Ok(());
    }
    match ctx.sessions.append(user_id, item).await {
        Ok(count) => {
            debug!(user_id, queued = count, "item accepted");
            ctx.stats.record(StatAction::Item).await?;
            send_accumulation_hint(bot, msg.chat.id, user_id, ctx, language).await?;
        }
        Err(e) => {
            warn!(user_id, error = %e, "item arrived without a session");
            bot.send_message(msg.chat.id, t_lang("session-required", language))
                .await?;
        }
    }
    Ok(())
}

fn is_office_document(lower_name: &str) -> bool {
    const OFFICE_EXTENSIONS: &[&str] = &[
        ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp", ".rtf",
    ];
    OFFICE_EXTENSIONS
        .iter()
        .any(|extension| lower_name.ends_with(extension))
}

/// Broadcast a message from the administrator to every known user. Delivery
/// failures are logged and skipped; the reported count only includes
/// successful sends.
async fn handle_broadcast(
    bot: &Bot,
    msg: &Message,
    ctx: &Arc<AppContext>,
    text: &str,
    admin_language: &str,
) -> Result<()> {
    let user_ids = ctx.users.all_user_ids().await;
    let mut sent = 0usize;
    for uid in user_ids {
        let recipient_language = ctx.users.language_of(uid).await;
        let message = format!(
            "{}\n\n{}",
            t_lang("broadcast-prefix", &recipient_language),
            text
        );
        match bot.send_message(ChatId(uid as i64), message).await {
            Ok(_) => sent += 1,
            Err(e) => error!(recipient = uid, error = %e, "broadcast delivery failed"),
        }
    }
    info!(sent, "broadcast finished");
    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "admin-broadcast-sent",
            &[("count", &sent.to_string())],
            admin_language,
        ),
    )
    .await?;
    Ok(())
}

/// Forward the administrator's chosen message to every known user.
async fn handle_forward(
    bot: &Bot,
    msg: &Message,
    ctx: &Arc<AppContext>,
    admin_language: &str,
) -> Result<()> {
    let user_ids = ctx.users.all_user_ids().await;
    let mut forwarded = 0usize;
    for uid in user_ids {
        match bot
            .forward_message(ChatId(uid as i64), msg.chat.id, msg.id)
            .await
        {
            Ok(_) => forwarded += 1,
            Err(e) => error!(recipient = uid, error = %e, "forward delivery failed"),
        }
    }
    info!(forwarded, "forward finished");
    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "admin-forward-sent",
            &[("count", &forwarded.to_string())],
            admin_language,
        ),
    )
    .await?;
    Ok(())
}
