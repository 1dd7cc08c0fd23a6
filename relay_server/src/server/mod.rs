pub mod connection;
pub mod handler;
pub mod http;
pub mod liveness;
pub mod registry;
pub mod run;
pub mod session;
pub mod state;
pub mod ws;

// Export commonly used types and functions
pub use connection::{ConnectionHandle, ConnectionId};
pub use registry::Registry;
pub use run::{build_router, run_server};
pub use session::{Phase, Session, Slot};
pub use state::AppState;
