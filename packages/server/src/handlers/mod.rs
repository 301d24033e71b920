pub mod auth;
pub mod stream;
pub mod user;
pub mod video;
