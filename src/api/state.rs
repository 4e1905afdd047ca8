use std::sync::Arc;

use crate::graph::Executor;
use crate::services::Services;

use super::auth::AuthVerifier;

/// Shared handle for the HTTP layer. Everything inside is immutable after
/// startup: the compiled graph, the service adapters, and the lazily-filled
/// JWKS cache. No per-request state lives here.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub executor: Arc<Executor>,
    pub auth: Arc<AuthVerifier>,
}

impl AppState {
    pub fn new(services: Arc<Services>, executor: Executor, auth: AuthVerifier) -> Self {
        Self {
            services,
            executor: Arc::new(executor),
            auth: Arc::new(auth),
        }
    }
}
