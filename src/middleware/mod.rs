/// Middleware module
///
/// Custom middleware for authentication and request logging.

mod auth_gate;
mod request_logger;

pub use auth_gate::AuthGate;
pub use request_logger::RequestLogger;
