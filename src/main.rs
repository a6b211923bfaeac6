use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagebinder::bot::{callback_handler, message_handler};
use pagebinder::config::Config;
use pagebinder::context::AppContext;
use pagebinder::dialogue::ConversationState;
use pagebinder::localization::init_localization;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    init_localization();

    let ctx = Arc::new(AppContext::new(config.clone()));
    let bot = Bot::new(&config.bot_token);

    info!("starting pagebinder bot");

    let schema = dialogue::enter::<Update, InMemStorage<ConversationState>, ConversationState, _>()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![
            InMemStorage::<ConversationState>::new(),
            ctx
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
