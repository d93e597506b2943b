//! HTTP and WebSocket handlers.
//!
//! Handlers are thin: catalogue routes serialize registry data, and the
//! WebSocket route bridges frames to the [`SessionManager`](crate::manager::SessionManager).

pub mod catalog;
pub mod ws;
