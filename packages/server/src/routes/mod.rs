use axum::{
    Router,
    routing::{get, post, put},
};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn api_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/videos", video_routes(config))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/verify-email-otp", post(handlers::auth::verify_email_otp))
        .route(
            "/request-password-reset",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/verify-password-reset-otp",
            post(handlers::auth::verify_password_reset_otp),
        )
        .route("/set-new-password", post(handlers::auth::set_new_password))
        .route("/resend-otp", post(handlers::auth::resend_otp))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::user::list_users))
        .route("/info", get(handlers::user::get_own_profile))
        .route("/edit", put(handlers::user::edit_own_profile))
        .route("/{id}", get(handlers::user::get_user))
}

fn video_routes(config: &AppConfig) -> Router<AppState> {
    let crud = Router::new()
        .route("/", get(handlers::video::list_videos))
        .route(
            "/{id}",
            get(handlers::video::get_video)
                .put(handlers::video::update_video)
                .delete(handlers::video::delete_video),
        )
        .route("/view/{id}", post(handlers::video::record_view))
        .route("/stream/{filename}", get(handlers::stream::stream_video))
        .route("/thumbnail/{id}", get(handlers::stream::stream_thumbnail));

    let upload = Router::new()
        .route("/upload", post(handlers::video::upload_video))
        .layer(handlers::video::upload_body_limit(&config.upload));

    crud.merge(upload)
}
