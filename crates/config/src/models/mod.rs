pub mod api_observability;
pub mod app_config;
pub mod broker;
pub mod database;
pub mod handlers;
pub mod processing;
pub mod scheduling;

pub use api_observability::*;
pub use app_config::*;
pub use broker::*;
pub use database::*;
pub use handlers::*;
pub use processing::*;
pub use scheduling::*;
