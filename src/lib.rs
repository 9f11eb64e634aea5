pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod key_generator;
pub mod metrics;
pub mod middleware;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod redis_store;
pub mod response;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{AdmissionError, AdmissionResult};
pub use rate_limit_config::Policy;
pub use rate_limiter::{Decision, Quota, RateLimiter};
pub use response::Rejection;
pub use server::create_app;
pub use store::{CounterStore, MemoryStore};
