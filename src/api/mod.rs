//! Intake HTTP API.
//!
//! Accepts finished assessments and produces AI summaries (streamed as
//! server-sent events, or as a single JSON response). `intake_router()`
//! returns a composable `Router`; `start_server()` runs it in the background.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::intake_router;
pub use server::{start_server, IntakeServer, ServerError, ServerSession};
pub use types::ApiContext;
