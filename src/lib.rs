pub mod api;
pub mod app_state;
pub mod caption;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod scratch;
pub mod translate;

pub use app_state::AppState;
pub use config::Config;
