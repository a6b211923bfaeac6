//! Bot module containing the Telegram update handlers and UI helpers.

pub mod callback_handler;
pub mod compile_flow;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
