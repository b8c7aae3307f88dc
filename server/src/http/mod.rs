pub mod dto;
pub mod error;
pub mod handlers;
mod server;
pub mod state;


pub use error::{ApiError, ApiResult};
pub use server::{build_router, serve, start_server};
pub use state::AppState;
