//! Config schema types (account, api, activation profile, storage, output).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default vendor API root.
pub const DEFAULT_BASE_URL: &str = "https://wbsapi.withings.net";

/// Redirect URI registered for the partner application.
pub const DEFAULT_CALLBACK_URI: &str = "https://google.com/";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StethoConfig {
    pub account: AccountConfig,
    pub api: ApiConfig,
    pub profile: ActivationProfile,
    pub storage: StorageConfig,
    pub output: OutputConfig,
}

impl StethoConfig {
    /// Reject configs that cannot drive the credential chain.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.account.email.trim().is_empty() {
            anyhow::bail!("account.email is not set (config file or STETHO_EMAIL)");
        }
        if self.account.client_id.trim().is_empty() {
            anyhow::bail!("account.client_id is not set (config file or STETHO_CLIENT_ID)");
        }
        if self.account.mac_addresses.is_empty() {
            anyhow::bail!("account.mac_addresses must list at least one device");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// The account owning the devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Email of the end user; the vendor creates the account on first activation.
    pub email: String,
    /// Partner application client id.
    pub client_id: String,
    /// Mac addresses of the devices linked on activation.
    pub mac_addresses: Vec<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            client_id: String::new(),
            mac_addresses: vec!["00:24:e4:8b:77:3c".into()],
        }
    }
}

/// How `requesttoken` calls prove possession of the shared secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAuth {
    /// Nonce handshake followed by an HMAC signature.
    #[default]
    Signature,
    /// Legacy: send the secret itself as `client_secret`.
    ClientSecret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub callback_uri: String,
    pub grant_auth: GrantAuth,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            callback_uri: DEFAULT_CALLBACK_URI.into(),
            grant_auth: GrantAuth::default(),
            timeout_secs: 30,
        }
    }
}

/// User profile sent with the `activate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationProfile {
    /// UNIX timestamp.
    pub birthdate: i64,
    /// JSON array of `{value, unit, type}` measures.
    pub measures: String,
    pub gender: u8,
    pub preflang: String,
    pub timezone: String,
    pub shortname: String,
    pub external_id: String,
    /// JSON object of unit preferences.
    pub unit_pref: String,
    pub mailingpref: u8,
}

impl Default for ActivationProfile {
    fn default() -> Self {
        Self {
            birthdate: 848_166_152,
            measures: r#"[{"value": 190, "unit": -2, "type": 4},{"value": 90, "unit": 0, "type": 1}]"#
                .into(),
            gender: 0,
            preflang: "en_US".into(),
            timezone: "America/New_York".into(),
            shortname: "JDE".into(),
            external_id: "my-external-id".into(),
            unit_pref: r#"{"weight":1,"height":6,"distance":6,"temperature":11}"#.into(),
            mailingpref: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Credential file. Defaults to `~/.config/stetho/credentials.json`.
    pub path: Option<PathBuf>,
    /// Store service name holding the shared secret.
    pub secret_service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            secret_service: "stetho".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving bulk downloads.
    pub sound_dir: PathBuf,
    /// File written by the interactive fetch.
    pub file_name: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sound_dir: PathBuf::from("."),
            file_name: PathBuf::from("output.wav"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StethoConfig {
        let mut cfg = StethoConfig::default();
        cfg.account.email = "jane@example.com".into();
        cfg.account.client_id = "abc123".into();
        cfg
    }

    #[test]
    fn defaults_match_vendor_setup() {
        let cfg = StethoConfig::default();
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.api.grant_auth, GrantAuth::Signature);
        assert_eq!(cfg.account.mac_addresses, vec!["00:24:e4:8b:77:3c"]);
        assert_eq!(cfg.profile.preflang, "en_US");
        assert_eq!(cfg.storage.secret_service, "stetho");
    }

    #[test]
    fn validate_requires_identity() {
        assert!(StethoConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());

        let mut cfg = valid();
        cfg.account.client_id = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_devices() {
        let mut cfg = valid();
        cfg.account.mac_addresses.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn grant_auth_serializes_snake_case() {
        let json = serde_json::to_string(&GrantAuth::ClientSecret).unwrap();
        assert_eq!(json, "\"client_secret\"");
    }
}
