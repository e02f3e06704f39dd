//! The shared HMAC secret of the partner application.
//!
//! Persisted once in the credential store and read lazily when something has
//! to be signed. When nothing is stored the [`SecretProvider`] is asked, which
//! on the console means a non-echoed prompt.

use std::rc::Rc;

use {
    secrecy::{ExposeSecret, Secret},
    tracing::info,
};

use crate::{
    error::{Error, Result},
    store::CredentialStore,
};

/// Store key holding the secret under its service.
pub const SECRET_KEY: &str = "secret";

/// Source of the secret when none is stored yet.
pub trait SecretProvider {
    /// `Ok(None)` when the secret cannot be obtained.
    fn provide_secret(&self) -> Result<Option<Secret<String>>>;
}

/// Asks on the terminal without echo.
#[derive(Debug, Clone)]
pub struct ConsolePrompt {
    prompt: String,
}

impl ConsolePrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new("Secret: ")
    }
}

impl SecretProvider for ConsolePrompt {
    fn provide_secret(&self) -> Result<Option<Secret<String>>> {
        let answer = rpassword::prompt_password(&self.prompt)
            .map_err(|e| Error::SecretUnavailable(format!("cannot read from terminal: {e}")))?;
        let answer = answer.trim().to_string();
        Ok((!answer.is_empty()).then(|| Secret::new(answer)))
    }
}

/// Never provides anything; for non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl SecretProvider for NoPrompt {
    fn provide_secret(&self) -> Result<Option<Secret<String>>> {
        Ok(None)
    }
}

pub struct SecretStore {
    store: Rc<dyn CredentialStore>,
    service: String,
    provider: Box<dyn SecretProvider>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl SecretStore {
    pub fn new(
        store: Rc<dyn CredentialStore>,
        service: impl Into<String>,
        provider: Box<dyn SecretProvider>,
    ) -> Self {
        Self {
            store,
            service: service.into(),
            provider,
        }
    }

    /// The stored secret, or a freshly provided one which is then persisted.
    pub fn get_or_prompt_secret(&self) -> Result<Secret<String>> {
        if let Some(stored) = self.stored()? {
            return Ok(stored);
        }

        info!(service = %self.service, "shared secret is not set yet");
        match self.provider.provide_secret()? {
            Some(secret) => {
                self.set(&secret)?;
                Ok(secret)
            },
            None => Err(Error::SecretUnavailable(format!(
                "no secret stored for `{}` and none was provided",
                self.service
            ))),
        }
    }

    pub fn is_set(&self) -> Result<bool> {
        Ok(self.stored()?.is_some())
    }

    /// Replace the stored secret.
    pub fn set(&self, secret: &Secret<String>) -> Result<()> {
        self.store
            .write(&self.service, SECRET_KEY, secret.expose_secret())?;
        info!(service = %self.service, "shared secret saved");
        Ok(())
    }

    /// Forget the stored secret; the next signing prompts again.
    pub fn reset(&self) -> Result<()> {
        self.store.delete(&self.service, SECRET_KEY)?;
        info!(service = %self.service, "shared secret removed");
        Ok(())
    }

    fn stored(&self) -> Result<Option<Secret<String>>> {
        Ok(self
            .store
            .read(&self.service, SECRET_KEY)?
            .filter(|s| !s.is_empty())
            .map(Secret::new))
    }
}
