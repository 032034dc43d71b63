//! Application state shared across handlers

use std::sync::Arc;

use crate::config::AppConfig;
use crate::jwt::JwtService;
use crate::media::MediaStorage;
use crate::store::BlogStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlogStore>,
    pub jwt: JwtService,
    pub media: MediaStorage,
}

impl AppState {
    pub fn new(store: Arc<dyn BlogStore>, config: &AppConfig) -> Self {
        Self {
            store,
            jwt: JwtService::new(&config.jwt()),
            media: MediaStorage::new(&config.media_root, config.max_upload_bytes),
        }
    }
}
