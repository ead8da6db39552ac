/// Configuration loading and validation
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{window_length, Config, EmailConfig, LoginConfig, ModulesConfig, QueryConfig, TransportConfig};
