pub mod app;
pub mod client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod extension;
pub mod handlers;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod timer;

pub use app::router;
pub use config::Config;
pub use errors::{AppError, Result};
pub use state::AppState;
pub use storage::Store;
