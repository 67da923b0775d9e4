//! Fixed-response HTTP responder.
//!
//! # Data Flow
//! ```text
//! HttpServer::init (new → bind → listen)
//!     → on_accept     session created, connection attached
//!     → on_receive    bytes acknowledged and dropped, response queued once
//!     → on_acknowledge remaining counts down to zero → close
//!     → on_idle       safety net for drained or orphaned connections
//!     → on_error      session released, handle already gone
//! ```
//!
//! Session states: Idle → ResponseSent → Closed (removed from the table).

pub mod handler;
pub mod response;
pub mod server;
pub mod session;

pub use handler::{AcceptError, ConnectionHandler};
pub use response::RESPONSE;
pub use server::{HttpServer, SetupError};
pub use session::{Session, SessionState};
