//! Wiring of config, store, transport and prompt into a credential chain.

use std::{
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use {
    anyhow::{Context, Result},
    stetho_config::StethoConfig,
    stetho_oauth::{
        ChainSettings, ConsolePrompt, CredentialChain, CredentialStore, FileCredentialStore,
        HttpTransport, SecretStore, SystemClock,
    },
    tracing::debug,
};

pub fn load_config(explicit: Option<&Path>) -> Result<StethoConfig> {
    match explicit {
        Some(path) => stetho_config::load_config(path),
        None => stetho_config::discover_and_load(),
    }
}

pub fn store_path(config: &StethoConfig) -> PathBuf {
    config
        .storage
        .path
        .clone()
        .unwrap_or_else(stetho_config::default_store_path)
}

pub fn open_store(config: &StethoConfig) -> Rc<dyn CredentialStore> {
    let path = store_path(config);
    debug!(path = %path.display(), "using credential store");
    Rc::new(FileCredentialStore::new(path))
}

/// Secret store that prompts on the terminal when nothing is stored.
pub fn secret_store(config: &StethoConfig, store: Rc<dyn CredentialStore>) -> SecretStore {
    SecretStore::new(
        store,
        config.storage.secret_service.clone(),
        Box::new(ConsolePrompt::default()),
    )
}

pub fn open_chain(config: &StethoConfig) -> Result<CredentialChain> {
    config.validate()?;
    let transport = HttpTransport::new(
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    )
    .context("failed to build HTTP client")?;
    let store = open_store(config);
    let chain = CredentialChain::new(
        ChainSettings::from_config(config),
        Box::new(transport),
        store.clone(),
        secret_store(config, store),
        Box::new(SystemClock),
    )?;
    Ok(chain)
}

/// Whether `error` stems from a missing shared secret.
pub fn is_secret_unavailable(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<stetho_oauth::Error>(),
            Some(stetho_oauth::Error::SecretUnavailable(_))
        ) || matches!(
            cause.downcast_ref::<stetho_signals::Error>(),
            Some(stetho_signals::Error::Api(stetho_oauth::Error::SecretUnavailable(_)))
        )
    })
}
