pub mod auth;
pub mod comments;
pub mod settings;
pub mod error;
pub mod models;
pub mod moderation;
pub mod openapi;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;
pub mod seed;
pub mod stories;
pub mod validation;

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable one of the `inmem-store` or `postgres-store` features");

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
