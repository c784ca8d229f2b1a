pub mod env;
mod loader;

pub use env::{
    AppConfig, DirectoryConfig, LabelingConfig, LogRotation, QueueConfig, TargetConfig,
};
pub use loader::load_config;
