pub mod app;
pub mod comment;
pub mod community;
pub mod counters;
pub mod database;
pub mod media;
pub mod middleware;
pub mod post;
pub mod realtime;
pub mod router;
pub mod utils;
pub mod vote;
