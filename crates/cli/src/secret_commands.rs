use {
    anyhow::{Result, bail},
    clap::Subcommand,
    stetho_config::StethoConfig,
    stetho_oauth::{ConsolePrompt, SecretProvider},
};

use crate::session;

#[derive(Subcommand)]
pub enum SecretAction {
    /// Store the partner application's shared secret.
    Set,
    /// Remove the stored secret; the next signed call prompts again.
    Reset,
}

pub fn handle_secret(config: &StethoConfig, action: SecretAction) -> Result<()> {
    let secrets = session::secret_store(config, session::open_store(config));
    match action {
        SecretAction::Set => {
            let Some(secret) = ConsolePrompt::new("New secret: ").provide_secret()? else {
                bail!("empty secret, nothing stored");
            };
            secrets.set(&secret)?;
            println!("Secret saved to {}", session::store_path(config).display());
        },
        SecretAction::Reset => {
            secrets.reset()?;
            println!("Secret removed");
        },
    }
    Ok(())
}
