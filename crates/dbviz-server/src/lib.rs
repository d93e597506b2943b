//! Playback engine, session layer and HTTP/WebSocket transport for dbviz.
//!
//! A client connects over WebSocket, selects a project, starts operations
//! and scrubs through the resulting traces. Catalogue data (projects and
//! scenarios) is also served over plain HTTP.

pub mod config;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod playback;
pub mod router;
pub mod schema;
pub mod session;
pub mod state;
