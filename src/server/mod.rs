//! HTTP server: shared state, the router with its middleware stack, and
//! the builder that binds it all to a socket

pub mod builder;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use builder::ServerBuilder;
pub use router::{API_PREFIX, build_router};
pub use state::AppState;
