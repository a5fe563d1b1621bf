//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use therapy_core::ports::{DatabaseService, TherapyChatService};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub chat: Arc<dyn TherapyChatService>,
    pub config: Arc<Config>,
}
