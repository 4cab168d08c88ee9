//! TIL Backend Library
//!
//! Authentication core of the notes API: signing keys, token codec, session
//! rotation and the request gate. Exposed for the server binary and tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod middleware;
pub mod routes;

pub use config::Config;
pub use routes::{build_auth, build_router, cors_layer};
