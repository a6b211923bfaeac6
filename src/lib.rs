//! # Pagebinder Telegram Bot
//!
//! A Telegram bot that accumulates text snippets and photos sent over
//! successive messages and compiles them, in arrival order, into a single
//! paginated PDF. Office documents are converted through LibreOffice and
//! rasterised into page images before entering the queue.

pub mod bot;
pub mod compile;
pub mod config;
pub mod context;
pub mod convert;
pub mod dialogue;
pub mod localization;
pub mod render;
pub mod session;
pub mod store;
