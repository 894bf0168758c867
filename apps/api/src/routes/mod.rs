pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::rate_limit::limit_by_client;
use crate::resources::{self, profiles, templates, Profile, Prompt, Template};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_handler))
        .merge(resources::routes::<Profile>())
        .route("/profiles/:id/export", get(profiles::handle_export))
        .merge(resources::routes::<Prompt>())
        .merge(resources::routes::<Template>())
        .route("/templates/:id/use", post(templates::handle_use_template))
        .layer(middleware::from_fn_with_state(state.clone(), limit_by_client));

    let mut app = Router::new().nest("/api", api);

    // Built UI with client-side routing
    if let Some(dir) = &state.config.static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.with_state(state)
}
