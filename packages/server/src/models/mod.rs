pub mod auth;
pub mod shared;
pub mod user;
pub mod video;
