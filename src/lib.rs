pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod session;
pub mod views;

pub use error::AppError;
pub use router::{AppState, app_router};
