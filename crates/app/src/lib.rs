#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod seed;
pub mod session;

pub use router::{AppState, build_router};
pub use session::CookieSettings;
