use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;

/// Shared application state. The connection mutex is also the
/// critical section for booking creation: conflict check and insert
/// happen under one guard, so two requests for the same room cannot
/// both pass the check.
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
}
