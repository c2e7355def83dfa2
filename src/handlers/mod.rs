//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `assistant` - Voice assistant WebSocket sessions

pub mod api;
pub mod assistant;

pub use assistant::assistant_handler;
