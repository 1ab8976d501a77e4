use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::{MoveOrchestrator, Notifier};

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: SqlitePool,
    pub notifier: Notifier,
    pub orchestrator: MoveOrchestrator,
    pub config: Arc<Config>,
    /// Cancelled on shutdown; request-scoped tokens are children of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        notifier: Notifier,
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db,
            notifier,
            orchestrator: MoveOrchestrator::from_config(&config.ranking),
            config,
            shutdown,
        }
    }
}
