pub mod app;
pub mod cloud;
pub mod config;
pub mod error;
pub mod gate;
pub mod manage_handlers;
pub mod metrics;
pub mod routes;
pub mod sign_in;

pub use app::AppState;
pub use routes::build_router;
