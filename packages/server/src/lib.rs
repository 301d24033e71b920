pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod mail;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod seed;
pub mod state;
pub mod storage;
pub mod utils;

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidhost API",
        version = "1.0.0",
        description = "Video hosting backend: accounts, video metadata, and chunked file streaming"
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::verify_email_otp,
        handlers::auth::request_password_reset,
        handlers::auth::verify_password_reset_otp,
        handlers::auth::set_new_password,
        handlers::auth::resend_otp,
        handlers::user::get_own_profile,
        handlers::user::get_user,
        handlers::user::list_users,
        handlers::user::edit_own_profile,
        handlers::video::upload_video,
        handlers::video::list_videos,
        handlers::video::get_video,
        handlers::video::update_video,
        handlers::video::delete_video,
        handlers::video::record_view,
        handlers::stream::stream_video,
        handlers::stream::stream_thumbnail,
    ),
    tags(
        (name = "Auth", description = "Registration, login, and one-time codes"),
        (name = "Users", description = "User profiles"),
        (name = "Videos", description = "Video CRUD and view counts"),
        (name = "Streaming", description = "Stored video and thumbnail delivery"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allow_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ])
        .max_age(Duration::from_secs(config.max_age))
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .nest("/api", routes::api_routes(&state.config))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
