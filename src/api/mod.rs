//! Question bank HTTP API
//!
//! Public browsing endpoints, session login and the admin surface
//! (question/paper/user management, Excel import and export).
//! Run with `quizbank-server`.

pub mod admin;
pub mod extract;
pub mod handlers;
pub mod server;
pub mod transfer;

pub use server::{build_router, run_api_server, ApiConfig, AppState};
