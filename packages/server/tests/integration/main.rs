mod streaming;
mod users;
mod videos;
