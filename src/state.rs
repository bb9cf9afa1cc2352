use crate::config::AppConfig;
use crate::store::DocumentStore;
use crate::sync::{CascadeDeleteCoordinator, ForumFeed, MutationGateway, SubscriptionManager};
use std::sync::Arc;

/// Shared application state handed to every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub subscriptions: SubscriptionManager,
    pub gateway: Arc<MutationGateway>,
    pub cascade: Arc<CascadeDeleteCoordinator>,
    pub forum: ForumFeed,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        let subscriptions = SubscriptionManager::new(store.clone(), config.feed_buffer);
        let gateway = Arc::new(MutationGateway::new(store.clone(), config.age_bounds));
        let cascade = Arc::new(CascadeDeleteCoordinator::new(store.clone(), config.cascade_max_attempts));
        let forum = ForumFeed::new(store.clone(), subscriptions.clone(), gateway.clone());

        Self {
            config: Arc::new(config),
            store,
            subscriptions,
            gateway,
            cascade,
            forum,
        }
    }
}

/// Memory-backed state with test defaults.
#[cfg(test)]
pub fn test_state(store: Arc<dyn DocumentStore>) -> AppState {
    let config = AppConfig::from_lookup(|key| match key {
        "STORE_BACKEND" => Some("memory".into()),
        "JWT_SECRET" => Some("test-secret".into()),
        _ => None,
    })
    .expect("test config");
    AppState::new(config, store)
}
