//! Route gateway for the query service (EMBP).
//!
//! Sibling modules each export a subrouter over [`AppState`]; `main.rs` only
//! sees [`router`].

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::{Config, Dashboard};

mod dashboard;
mod health;
mod run_pipeline;
mod time_series;

// ---

/// Shared state of every handler.
///
/// The loaded [`Dashboard`] is immutable; a reload swaps in a new `Arc`, so
/// readers never block each other and never see a half-loaded snapshot.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub pool: SqlitePool,
    pub config: Config,
    dashboard: Arc<RwLock<Arc<Dashboard>>>,
    /// Serializes pipeline runs started over HTTP.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    // ---
    pub fn new(pool: SqlitePool, config: Config, dashboard: Dashboard) -> Self {
        AppState {
            pool,
            config,
            dashboard: Arc::new(RwLock::new(Arc::new(dashboard))),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The currently loaded snapshot.
    pub async fn dashboard(&self) -> Arc<Dashboard> {
        self.dashboard.read().await.clone()
    }

    async fn replace_dashboard(&self, dashboard: Dashboard) {
        *self.dashboard.write().await = Arc::new(dashboard);
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(time_series::router())
        .merge(run_pipeline::router())
        .merge(health::router())
        .with_state(state)
}
