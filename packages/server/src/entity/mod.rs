pub mod bucket_chunk;
pub mod bucket_file;
pub mod role;
pub mod role_permission;
pub mod user;
pub mod video;
