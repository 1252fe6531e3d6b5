//! HTTP and WebSocket surface over the workflow engine (§4.10).

pub mod asyncapi;
pub mod error;
pub mod http;
pub mod state;
pub mod websocket;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;
