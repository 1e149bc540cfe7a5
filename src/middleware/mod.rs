pub mod auth;
pub mod request_logger;

pub use auth::CallerIdentity;
pub use request_logger::request_logger_middleware;
