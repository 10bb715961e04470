pub mod handlers;
pub mod router;
pub mod types;

pub use router::{AppState, api_router};
