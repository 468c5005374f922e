pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use config::ServerConfig;
pub use error::ServerError;
pub use routes::router;
pub use state::AppState;
