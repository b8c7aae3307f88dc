pub mod auth;
pub mod cache;
pub mod clock;
pub mod http;
pub mod repository;
pub mod resolver;
pub mod settings;
pub mod storage;
