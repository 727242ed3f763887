// src/cfg/mod.rs

pub mod config;

pub use config::{load_config, Config, DeletePolicy, RenamePolicy, StoreConfig};
