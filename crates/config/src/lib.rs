//! Configuration for the stetho client: account identity, vendor API settings,
//! activation profile, credential storage and output locations.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, default_store_path, discover_and_load, load_config},
    schema::{
        AccountConfig, ActivationProfile, ApiConfig, GrantAuth, OutputConfig, StethoConfig,
        StorageConfig,
    },
};
