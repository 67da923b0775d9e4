//! Fixed-response HTTP responder over a callback-driven TCP engine.

pub mod config;
pub mod httpd;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod transport;

pub use config::schema::ServerConfig;
pub use httpd::{ConnectionHandler, HttpServer};
pub use lifecycle::Shutdown;
pub use transport::TcpEngine;
