//! UI Builder module for creating keyboards and formatting messages

use std::collections::HashMap;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::localization::t_lang;
use crate::store::UsageStats;

/// Inline keyboard offering every supported language.
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🇬🇧 English", "lang_en"),
            InlineKeyboardButton::callback("🇰🇿 Қазақ", "lang_kz"),
            InlineKeyboardButton::callback("🇷🇺 Русский", "lang_ru"),
        ],
        vec![
            InlineKeyboardButton::callback("🇺🇿 O'zbek", "lang_uz"),
            InlineKeyboardButton::callback("🇹🇷 Türkçe", "lang_tr"),
            InlineKeyboardButton::callback("🇺🇦 Українська", "lang_ua"),
        ],
    ])
}

/// Reply keyboard shown before any item has arrived: language and help only.
pub fn base_reply_keyboard(language: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(t_lang("btn-change-lang", language)),
        KeyboardButton::new(t_lang("btn-help", language)),
    ]])
    .resize_keyboard()
}

/// Reply keyboard shown once items are accumulating: adds the compile action.
pub fn collecting_reply_keyboard(language: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(t_lang("btn-compile", language))],
        vec![
            KeyboardButton::new(t_lang("btn-change-lang", language)),
            KeyboardButton::new(t_lang("btn-help", language)),
        ],
    ])
    .resize_keyboard()
}

/// Yes/no inline keyboard for the filename decision.
pub fn filename_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t_lang("filename-yes", language), "filename_yes"),
        InlineKeyboardButton::callback(t_lang("filename-no", language), "filename_no"),
    ]])
}

/// Administrator panel menu.
pub fn admin_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("admin-btn-broadcast", language),
            "admin_broadcast",
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("admin-btn-forward", language),
            "admin_forward",
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("admin-btn-stats", language),
            "admin_stats",
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("admin-btn-close", language),
            "admin_cancel",
        )],
    ])
}

/// Format the admin statistics view: counters, user total, and a per-language
/// breakdown sorted by language code.
pub fn format_stats(
    stats: &UsageStats,
    total_users: usize,
    language_counts: &HashMap<String, usize>,
    language: &str,
) -> String {
    let mut text = crate::localization::t_args_lang(
        "admin-stats",
        &[
            ("total", &stats.total.to_string()),
            ("items", &stats.items.to_string()),
            ("documents", &stats.documents.to_string()),
            ("users", &total_users.to_string()),
        ],
        language,
    );
    let mut languages: Vec<_> = language_counts.iter().collect();
    languages.sort_by(|a, b| a.0.cmp(b.0));
    for (lang, count) in languages {
        text.push_str(&format!("\n   - {}: {}", lang.to_uppercase(), count));
    }
    text
}
