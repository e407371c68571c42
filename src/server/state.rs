//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::catalog::CatalogService;
use crate::config::Config;
use crate::db::Database;
use crate::rpc::RpcRouter;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Procedure router.
    pub rpc: RpcRouter,
}

impl AppState {
    /// Wire the services on top of an open database.
    pub fn new_with_db(config: Config, db: Database) -> Self {
        let auth = AuthService::new(db.clone(), config.auth.session_days);
        let catalog = CatalogService::new(db, config.catalog.delete_recount);
        let rpc = RpcRouter::new(catalog, Arc::new(auth), config.auth.require_admin);

        Self {
            config: Arc::new(config),
            rpc,
        }
    }
}
