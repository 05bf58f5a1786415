use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use http::HeaderValue;
use tower_http::cors::CorsLayer;

use crate::{request_tracing, ServerState};

use super::{automation_log, automation_rule, follow_up, inbound_email};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let origins = [
            "https://replypilot.app",
            "https://localhost:3000",
            "http://localhost:3000",
        ]
        .into_iter()
        .map(|origin| origin.parse::<HeaderValue>().unwrap())
        .collect::<Vec<_>>();

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);

        Router::new()
            .route("/", get(|| async { "Replypilot server" }))
            .nest(
                "/users/:user_id",
                Router::new()
                    .route(
                        "/automation/rules",
                        get(automation_rule::list).post(automation_rule::create),
                    )
                    .route(
                        "/automation/rules/:rule_id",
                        put(automation_rule::update).delete(automation_rule::delete),
                    )
                    .route(
                        "/automation/rules/:rule_id/toggle",
                        post(automation_rule::toggle),
                    )
                    .route("/automation/log", get(automation_log::list))
                    .route(
                        "/follow_ups",
                        get(follow_up::list).post(follow_up::schedule),
                    )
                    .route("/follow_ups/:task_id/cancel", post(follow_up::cancel))
                    .route("/emails", post(inbound_email::ingest))
                    .route(
                        "/emails/:email_id/retrigger",
                        post(inbound_email::retrigger),
                    )
                    .with_state(state.clone()),
            )
            .layer(request_tracing::trace_with_request_id_layer())
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404)
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
