use {
    anyhow::Result,
    clap::Subcommand,
    secrecy::ExposeSecret,
    stetho_config::StethoConfig,
    stetho_oauth::{CredentialState, SlotStatus},
};

use crate::session;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show the state of the code, access token and refresh token.
    Status,
    /// Make sure a valid access token is stored, activating devices if needed.
    Login {
        /// Drop stored credentials first and go through activation again.
        #[arg(long)]
        force: bool,
    },
    /// Forget all stored credentials. The shared secret is kept.
    Logout,
}

pub fn handle_auth(config: &StethoConfig, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Status => status(config),
        AuthAction::Login { force } => login(config, force),
        AuthAction::Logout => logout(config),
    }
}

fn status(config: &StethoConfig) -> Result<()> {
    let chain = session::open_chain(config)?;
    for slot in chain.status() {
        println!("{}", describe(&slot));
    }
    let secret = if chain.secrets().is_set()? { "set" } else { "not set" };
    println!("secret [{secret}]");
    Ok(())
}

fn login(config: &StethoConfig, force: bool) -> Result<()> {
    let mut chain = session::open_chain(config)?;
    if force {
        chain.clear()?;
    }
    let token = chain.access_token()?;
    println!(
        "Logged in as {} (access token {})",
        chain.settings().email,
        masked(token.expose_secret())
    );
    Ok(())
}

fn logout(config: &StethoConfig) -> Result<()> {
    let mut chain = session::open_chain(config)?;
    chain.clear()?;
    println!("Stored credentials removed");
    Ok(())
}

fn describe(slot: &SlotStatus) -> String {
    match (slot.state, slot.time_left) {
        (CredentialState::Valid, Some(left)) => {
            let hours = left / 3600;
            let mins = (left % 3600) / 60;
            format!("{} [valid ({hours}h {mins}m remaining)]", slot.name)
        },
        (state, _) => format!("{} [{state}]", slot.name),
    }
}

fn masked(token: &str) -> String {
    let shown: String = token.chars().take(4).collect();
    format!("{shown}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_remaining_time() {
        let slot = SlotStatus {
            name: "access_token".into(),
            state: CredentialState::Valid,
            time_left: Some(3 * 3600 + 25 * 60 + 7),
        };
        assert_eq!(describe(&slot), "access_token [valid (3h 25m remaining)]");
    }

    #[test]
    fn describes_unusable_slot() {
        let slot = SlotStatus {
            name: "code".into(),
            state: CredentialState::Empty,
            time_left: None,
        };
        assert_eq!(describe(&slot), format!("code [{}]", CredentialState::Empty));
    }

    #[test]
    fn masks_token() {
        assert_eq!(masked("abcdef123"), "abcd…");
        assert_eq!(masked("ab"), "ab…");
    }
}
