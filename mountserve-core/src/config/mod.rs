//! Configuration for mountserve

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    LogFormat, LoggingConfig, MountConfig, MountserveConfig, ServerConfig,
    DEFAULT_CHUNK_SIZE, DEFAULT_LISTEN,
};
