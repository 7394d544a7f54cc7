pub(crate) mod board_repository;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod discord;
pub(crate) mod errors;
pub(crate) mod gate;
pub(crate) mod handlers;
pub(crate) mod metrics;
pub(crate) mod roles;
pub(crate) mod router;
pub(crate) mod session;
pub(crate) mod types;
pub(crate) mod user_repository;

pub use self::core::AppConfig;
pub use errors::init_tracing;
pub use router::build_router;
