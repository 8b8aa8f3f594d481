//! Domain services used by the route guard and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own auth, session and profile logic so route handlers
//! can stay focused on HTTP translation and cookie plumbing.

pub mod context;
pub mod debounce;
pub mod diagnostics;
pub mod events;
pub mod gateway;
pub mod profile;
pub mod session;
