/// Error types for decoding, modules, transports and configuration
pub mod error;

/// CloudTrail event model and log payload decoding
pub mod events;

/// Module contract and registry
pub mod modules;

/// Email dispatcher, detail modules and transports
pub mod email;

/// Configuration management
pub mod config;

/// Run driver
pub mod pipeline;

// Re-export commonly used types
pub use error::{ConfigError, DecodeError, ModuleError, PipelineError, TransportError};
pub use events::{decode_events, Event};
pub use modules::{Module, ModuleRegistry, QueryDescriptor};
pub use pipeline::{Pipeline, RunSummary};
