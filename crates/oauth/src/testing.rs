//! Scripted vendor transport for tests of the chain and its callers.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use {
    secrecy::ExposeSecret,
    serde_json::{Value, json},
    stetho_config::StethoConfig,
};

use crate::{
    chain::{ACCESS_TOKEN_SLOT, ChainSettings, CredentialChain},
    clock::{Clock, ManualClock},
    error::{Error, Result},
    secret::{NoPrompt, SecretStore},
    store::{CredentialStore, MemoryCredentialStore, StoreEntry, TIMESTAMP_KEY, VALUE_KEY},
    transport::{ApiRequest, Method, Transport},
};

/// A request as the scripted transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub bearer: Option<String>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Answers requests from per-action reply queues and records every call.
///
/// `getnonce` is answered automatically with increasing nonces unless a reply
/// was queued for it.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<HashMap<String, VecDeque<Value>>>,
    calls: RefCell<Vec<RecordedCall>>,
    next_nonce: Cell<u64>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            next_nonce: Cell::new(1000),
            ..Self::default()
        }
    }

    /// Queue a raw reply envelope for the next request with this action.
    pub fn reply(&self, action: &str, envelope: Value) {
        self.replies
            .borrow_mut()
            .entry(action.to_string())
            .or_default()
            .push_back(envelope);
    }

    /// Queue a successful reply carrying `body`.
    pub fn ok(&self, action: &str, body: Value) {
        self.reply(action, json!({"status": 0, "body": body}));
    }

    /// Queue a failed reply.
    pub fn fail(&self, action: &str, status: i64) {
        self.reply(action, json!({"status": status, "error": "scripted failure"}));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Number of requests made with this action.
    pub fn count(&self, action: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.param("action") == Some(action))
            .count()
    }

    pub fn last(&self, action: &str) -> Option<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|c| c.param("action") == Some(action))
            .cloned()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        self.calls.borrow_mut().push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            params: request.params.clone(),
            bearer: request
                .bearer
                .as_ref()
                .map(|t| t.expose_secret().clone()),
        });

        let action = request.action().to_string();
        if let Some(reply) = self
            .replies
            .borrow_mut()
            .get_mut(&action)
            .and_then(VecDeque::pop_front)
        {
            return Ok(reply);
        }

        if action == "getnonce" {
            let nonce = self.next_nonce.get();
            self.next_nonce.set(nonce + 1);
            return Ok(json!({"status": 0, "body": {"nonce": format!("n{nonce}")}}));
        }

        Err(Error::malformed(&action, "no scripted reply"))
    }
}

/// Chain over `transport` holding an access token valid at `clock`'s current
/// time, with the shared secret `s3cr3t` already stored.
pub fn chain_with_access_token(
    transport: Rc<ScriptedTransport>,
    clock: &ManualClock,
    access_token: &str,
) -> Result<CredentialChain> {
    let store = Rc::new(MemoryCredentialStore::new());
    store.write_batch(&[
        StoreEntry::new("stetho", "secret", "s3cr3t"),
        StoreEntry::new(ACCESS_TOKEN_SLOT, VALUE_KEY, access_token),
        StoreEntry::new(ACCESS_TOKEN_SLOT, TIMESTAMP_KEY, clock.now().to_string()),
    ])?;
    let store: Rc<dyn CredentialStore> = store;

    let mut config = StethoConfig::default();
    config.account.email = "jane@example.com".into();
    config.account.client_id = "client-1".into();

    CredentialChain::new(
        ChainSettings::from_config(&config),
        Box::new(transport),
        store.clone(),
        SecretStore::new(store, "stetho", Box::new(NoPrompt)),
        Box::new(clock.clone()),
    )
}
