//! Shared application state handed to every handler through the dispatcher.

use crate::config::Config;
use crate::session::SessionManager;
use crate::store::{StatsStore, UserStore};

/// Everything a handler needs: configuration, the session manager, and the
/// two persistence stores.
pub struct AppContext {
    pub config: Config,
    pub sessions: SessionManager,
    pub users: UserStore,
    pub stats: StatsStore,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let users = UserStore::new(config.users_file.clone());
        let stats = StatsStore::new(config.stats_file.clone());
        Self {
            config,
            sessions: SessionManager::new(),
            users,
            stats,
        }
    }
}
