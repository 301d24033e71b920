pub mod delete;
pub mod staging;
pub mod upload;
