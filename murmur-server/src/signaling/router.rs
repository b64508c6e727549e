use crate::coordinator::CoordinatorHandle;
use crate::signaling::ws_handler;
use axum::Router;
use axum::routing::get;

pub fn router(coordinator: CoordinatorHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/{identity}", get(ws_handler))
        .with_state(coordinator)
}

async fn health() -> &'static str {
    "ok"
}
