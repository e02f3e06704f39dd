//! HMAC-SHA256 request signing and the nonce handshake.
//!
//! Signed vendor actions need a server nonce, and the nonce request is itself
//! signed with the current UNIX timestamp standing in for the nonce. So every
//! signed action costs two round trips: `getnonce`, then the action.

use std::fmt::Display;

use {
    hmac::{Hmac, Mac},
    secrecy::ExposeSecret,
    serde::{Deserialize, Deserializer},
    sha2::Sha256,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    secret::SecretStore,
    transport::{ApiRequest, Transport, call_as},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PATH: &str = "/v2/signature";
const ACTION_GET_NONCE: &str = "getnonce";

/// Hex HMAC-SHA256 of `"{action},{client_id},{nonce}"` keyed by `secret`.
pub fn signature(
    secret: &[u8],
    action: &str,
    client_id: &str,
    nonce: impl Display,
) -> Result<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|e| Error::SecretUnavailable(format!("secret cannot key HMAC-SHA256: {e}")))?;
    mac.update(format!("{action},{client_id},{nonce}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Server-issued, single-use nonce. The vendor sends either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

#[derive(Deserialize)]
struct NonceBody {
    nonce: Nonce,
}

#[derive(Debug)]
pub struct SignatureHandshake {
    client_id: String,
    secrets: SecretStore,
}

impl SignatureHandshake {
    pub fn new(client_id: impl Into<String>, secrets: SecretStore) -> Self {
        Self {
            client_id: client_id.into(),
            secrets,
        }
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Sign `action` with `nonce`. The secret is fetched (or prompted for) now.
    pub fn sign(&self, action: &str, nonce: impl Display) -> Result<String> {
        let secret = self.secrets.get_or_prompt_secret()?;
        signature(
            secret.expose_secret().as_bytes(),
            action,
            &self.client_id,
            nonce,
        )
    }

    /// Ask the vendor for a nonce, signing the request with `now` as ad-hoc nonce.
    pub fn fetch_nonce(&self, transport: &dyn Transport, now: i64) -> Result<Nonce> {
        let request = ApiRequest::get(SIGNATURE_PATH)
            .param("action", ACTION_GET_NONCE)
            .param("client_id", &self.client_id)
            .param("timestamp", now)
            .param("signature", self.sign(ACTION_GET_NONCE, now)?);

        let body: NonceBody = call_as(transport, &request)?;
        if body.nonce.as_str().is_empty() {
            return Err(Error::malformed(ACTION_GET_NONCE, "empty nonce"));
        }
        debug!("received nonce");
        Ok(body.nonce)
    }

    /// Full two-phase handshake for `action`: the `nonce` and `signature`
    /// parameters to attach to the real request.
    pub fn signed_params(
        &self,
        transport: &dyn Transport,
        action: &str,
        now: i64,
    ) -> Result<Vec<(String, String)>> {
        let nonce = self.fetch_nonce(transport, now)?;
        let signature = self.sign(action, &nonce)?;
        Ok(vec![
            ("nonce".to_string(), nonce.to_string()),
            ("signature".to_string(), signature),
        ])
    }
}
