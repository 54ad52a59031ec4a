//! Development-mode plumbing: live reload and the HTTP front end.

pub mod reload;
pub mod server;

pub use reload::{ReloadBroadcaster, ReloadEvent};
pub use server::{build_router, serve, AppState};
