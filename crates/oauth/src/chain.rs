//! The activation code → access token → refresh token chain.
//!
//! A valid refresh token is always preferred: device activation (which links
//! the devices and creates the account) only happens once per refresh-token
//! lifetime, or after the credentials were cleared.

use std::rc::Rc;

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::Value,
    stetho_config::{ActivationProfile, GrantAuth, StethoConfig},
    tracing::{debug, info, warn},
};

use crate::{
    clock::Clock,
    credential::{CredentialState, ExpiringCredential},
    error::Result,
    secret::SecretStore,
    signature::SignatureHandshake,
    store::CredentialStore,
    transport::{ApiRequest, Transport, call, call_as},
};

pub const CODE_SLOT: &str = "code";
pub const ACCESS_TOKEN_SLOT: &str = "access_token";
pub const REFRESH_TOKEN_SLOT: &str = "refresh_token";

pub const CODE_TIMEOUT_SECS: i64 = 600;
pub const ACCESS_TOKEN_TIMEOUT_SECS: i64 = 3600;
pub const REFRESH_TOKEN_TIMEOUT_SECS: i64 = 31_536_000;

pub const USER_PATH: &str = "/v2/user";
pub const OAUTH2_PATH: &str = "/v2/oauth2";

const ACTION_ACTIVATE: &str = "activate";
const ACTION_REQUEST_TOKEN: &str = "requesttoken";

/// Everything the chain needs to know about the account.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub client_id: String,
    pub email: String,
    pub mac_addresses: Vec<String>,
    pub callback_uri: String,
    pub grant_auth: GrantAuth,
    pub profile: ActivationProfile,
}

impl ChainSettings {
    pub fn from_config(config: &StethoConfig) -> Self {
        Self {
            client_id: config.account.client_id.clone(),
            email: config.account.email.clone(),
            mac_addresses: config.account.mac_addresses.clone(),
            callback_uri: config.api.callback_uri.clone(),
            grant_auth: config.api.grant_auth,
            profile: config.profile.clone(),
        }
    }
}

/// Access and refresh token issued by one `requesttoken` reply.
pub struct TokenPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    userid: Option<Value>,
}

impl From<TokenBody> for TokenPair {
    fn from(body: TokenBody) -> Self {
        Self {
            access_token: Secret::new(body.access_token),
            refresh_token: Secret::new(body.refresh_token),
            user_id: body.userid.map(|id| match id {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        }
    }
}

/// Result of linking devices to the account.
pub struct Activation {
    /// Short-lived authorization code.
    pub code: Secret<String>,
    /// Device descriptions as returned by the vendor.
    pub devices: Vec<Value>,
}

#[derive(Deserialize)]
struct ActivateBody {
    user: ActivatedUser,
    #[serde(default)]
    devices: Vec<Value>,
}

#[derive(Deserialize)]
struct ActivatedUser {
    code: String,
}

/// Snapshot of one credential slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    pub name: String,
    pub state: CredentialState,
    pub time_left: Option<i64>,
}

pub struct CredentialChain {
    settings: ChainSettings,
    transport: Box<dyn Transport>,
    store: Rc<dyn CredentialStore>,
    handshake: SignatureHandshake,
    clock: Box<dyn Clock>,
    code: ExpiringCredential,
    access: ExpiringCredential,
    refresh: ExpiringCredential,
}

impl std::fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChain")
            .field("settings", &self.settings)
            .field("code", &self.code)
            .field("access", &self.access)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl CredentialChain {
    /// Build the chain, loading any persisted slots from `store`.
    pub fn new(
        settings: ChainSettings,
        transport: Box<dyn Transport>,
        store: Rc<dyn CredentialStore>,
        secrets: SecretStore,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let now = clock.now();
        let code = ExpiringCredential::new(CODE_SLOT, CODE_TIMEOUT_SECS)
            .single_use()
            .load(&*store, now)?;
        let access =
            ExpiringCredential::new(ACCESS_TOKEN_SLOT, ACCESS_TOKEN_TIMEOUT_SECS).load(&*store, now)?;
        let refresh = ExpiringCredential::new(REFRESH_TOKEN_SLOT, REFRESH_TOKEN_TIMEOUT_SECS)
            .load(&*store, now)?;
        let handshake = SignatureHandshake::new(settings.client_id.clone(), secrets);

        Ok(Self {
            settings,
            transport,
            store,
            handshake,
            clock,
            code,
            access,
            refresh,
        })
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn secrets(&self) -> &SecretStore {
        self.handshake.secrets()
    }

    /// A valid access token, regenerating the token pair when needed.
    pub fn access_token(&mut self) -> Result<Secret<String>> {
        let now = self.clock.now();
        if let Some(token) = self.access.valid_value(now) {
            return Ok(token);
        }
        debug!(state = %self.access.state(now), "access token needs regeneration");
        Ok(self.get_access_token()?.access_token)
    }

    /// Obtain a new token pair.
    ///
    /// Uses the `refresh_token` grant while the refresh token is valid;
    /// otherwise activates the devices for a fresh code and uses the
    /// `authorization_code` grant, consuming the code.
    pub fn get_access_token(&mut self) -> Result<TokenPair> {
        let now = self.clock.now();

        if let Some(refresh_token) = self.refresh.valid_value(now) {
            let request = self
                .token_request(now)?
                .param("grant_type", "refresh_token")
                .param("refresh_token", refresh_token.expose_secret());
            let pair: TokenPair = match call_as::<TokenBody>(&*self.transport, &request) {
                Ok(body) => body.into(),
                Err(e) if e.is_invalid_token() => {
                    warn!("refresh token rejected, discarding it");
                    self.refresh.invalidate(&*self.store)?;
                    return Err(e);
                },
                Err(e) => return Err(e),
            };
            self.store_token_pair(&pair)?;
            info!(grant = "refresh_token", "access and refresh tokens rotated");
            return Ok(pair);
        }

        debug!(state = %self.refresh.state(now), "refresh token unusable, activating devices");
        let code = self.resolve_code(now)?;
        let request = self
            .token_request(now)?
            .param("grant_type", "authorization_code")
            .param("code", code.expose_secret())
            .param("redirect_uri", &self.settings.callback_uri);
        let pair: TokenPair = call_as::<TokenBody>(&*self.transport, &request)?.into();
        self.store_token_pair(&pair)?;
        self.code.mark_used();
        info!(
            grant = "authorization_code",
            user_id = pair.user_id.as_deref().unwrap_or("unknown"),
            "access and refresh tokens issued"
        );
        Ok(pair)
    }

    /// Link `mac_addresses` to the account and return a fresh code.
    ///
    /// The vendor accepts devices that are already linked.
    pub fn activate(&self, mac_addresses: &[String]) -> Result<Activation> {
        activate_devices(
            &*self.transport,
            &self.handshake,
            &self.settings,
            mac_addresses,
            self.clock.now(),
        )
    }

    /// Send `request` with the current access token.
    ///
    /// When the vendor rejects the token, the access slot is dropped so the
    /// next call regenerates it; the error still reaches the caller.
    pub fn authorized(&mut self, request: ApiRequest) -> Result<Value> {
        let token = self.access_token()?;
        let request = request.bearer(token);
        match call(&*self.transport, &request) {
            Err(e) if e.is_invalid_token() => {
                warn!(action = request.action(), "access token rejected, discarding it");
                self.access.invalidate(&*self.store)?;
                Err(e)
            },
            other => other,
        }
    }

    pub fn status(&self) -> Vec<SlotStatus> {
        let now = self.clock.now();
        [&self.code, &self.access, &self.refresh]
            .into_iter()
            .map(|slot| SlotStatus {
                name: slot.name().to_string(),
                state: slot.state(now),
                time_left: slot.time_left(now),
            })
            .collect()
    }

    /// Forget all three slots. The next access goes through activation again.
    pub fn clear(&mut self) -> Result<()> {
        self.code.invalidate(&*self.store)?;
        self.access.invalidate(&*self.store)?;
        self.refresh.invalidate(&*self.store)?;
        info!("stored credentials cleared");
        Ok(())
    }

    fn resolve_code(&mut self, now: i64) -> Result<Secret<String>> {
        let Self {
            settings,
            transport,
            store,
            handshake,
            code,
            ..
        } = self;
        let (settings, handshake, transport) = (&*settings, &*handshake, &**transport);
        code.resolve(&**store, now, || {
            let activation =
                activate_devices(transport, handshake, settings, &settings.mac_addresses, now)?;
            Ok(activation.code.expose_secret().clone())
        })
    }

    /// `requesttoken` request carrying the configured grant authentication.
    fn token_request(&self, now: i64) -> Result<ApiRequest> {
        let request = ApiRequest::get(OAUTH2_PATH)
            .param("action", ACTION_REQUEST_TOKEN)
            .param("client_id", &self.settings.client_id);

        Ok(match self.settings.grant_auth {
            GrantAuth::Signature => request.params(self.handshake.signed_params(
                &*self.transport,
                ACTION_REQUEST_TOKEN,
                now,
            )?),
            GrantAuth::ClientSecret => {
                let secret = self.handshake.secrets().get_or_prompt_secret()?;
                request.param("client_secret", secret.expose_secret())
            },
        })
    }

    /// Persist both tokens in one store write, then update the slots.
    fn store_token_pair(&mut self, pair: &TokenPair) -> Result<()> {
        let now = self.clock.now();
        let access = pair.access_token.expose_secret();
        let refresh = pair.refresh_token.expose_secret();

        let mut entries = self.access.entries_for(access, now).to_vec();
        entries.extend(self.refresh.entries_for(refresh, now));
        self.store.write_batch(&entries)?;

        self.access.apply(access.clone(), now);
        self.refresh.apply(refresh.clone(), now);
        Ok(())
    }
}

fn activate_devices(
    transport: &dyn Transport,
    handshake: &SignatureHandshake,
    settings: &ChainSettings,
    mac_addresses: &[String],
    now: i64,
) -> Result<Activation> {
    let profile = &settings.profile;
    let request = ApiRequest::post(USER_PATH)
        .param("action", ACTION_ACTIVATE)
        .param("client_id", &settings.client_id)
        .param("email", &settings.email)
        .param("mac_addresses", serde_json::to_string(mac_addresses)?)
        .param("mailingpref", profile.mailingpref)
        .param("birthdate", profile.birthdate)
        .param("measures", &profile.measures)
        .param("gender", profile.gender)
        .param("preflang", &profile.preflang)
        .param("timezone", &profile.timezone)
        .param("shortname", &profile.shortname)
        .param("external_id", &profile.external_id)
        .param("unit_pref", &profile.unit_pref)
        .params(handshake.signed_params(transport, ACTION_ACTIVATE, now)?);

    let body: ActivateBody = call_as(transport, &request)?;
    info!(devices = body.devices.len(), "devices activated");
    Ok(Activation {
        code: Secret::new(body.user.code),
        devices: body.devices,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            clock::ManualClock,
            error::Error,
            secret::NoPrompt,
            store::{MemoryCredentialStore, TIMESTAMP_KEY, VALUE_KEY},
            testing::ScriptedTransport,
        },
        serde_json::json,
    };

    const T0: i64 = 1_700_000_000;

    struct Harness {
        transport: Rc<ScriptedTransport>,
        store: Rc<MemoryCredentialStore>,
        clock: ManualClock,
    }

    impl Harness {
        fn new() -> Self {
            let store = Rc::new(MemoryCredentialStore::new());
            store.write("stetho", "secret", "s3cr3t").unwrap();
            Self {
                transport: Rc::new(ScriptedTransport::new()),
                store,
                clock: ManualClock::new(T0),
            }
        }

        fn chain_with(&self, grant_auth: GrantAuth) -> CredentialChain {
            let store: Rc<dyn CredentialStore> = self.store.clone();
            let secrets = SecretStore::new(store.clone(), "stetho", Box::new(NoPrompt));
            let mut config = StethoConfig::default();
            config.account.email = "jane@example.com".into();
            config.account.client_id = "client-1".into();
            config.api.grant_auth = grant_auth;
            CredentialChain::new(
                ChainSettings::from_config(&config),
                Box::new(self.transport.clone()),
                store,
                secrets,
                Box::new(self.clock.clone()),
            )
            .unwrap()
        }

        fn chain(&self) -> CredentialChain {
            self.chain_with(GrantAuth::Signature)
        }

        fn script_activation(&self, code: &str) {
            self.transport.ok(
                "activate",
                json!({"user": {"code": code}, "devices": [{"mac_address": "00:24:e4:8b:77:3c"}]}),
            );
        }

        fn script_tokens(&self, access: &str, refresh: &str) {
            self.transport.ok(
                "requesttoken",
                json!({"access_token": access, "refresh_token": refresh, "userid": 4242, "expires_in": 10800}),
            );
        }

        fn seed(&self, slot: &str, value: &str, issued_at: i64) {
            self.store.write(slot, VALUE_KEY, value).unwrap();
            self.store
                .write(slot, TIMESTAMP_KEY, &issued_at.to_string())
                .unwrap();
        }
    }

    fn expose(s: Secret<String>) -> String {
        s.expose_secret().clone()
    }

    fn state_of(chain: &CredentialChain, slot: &str) -> SlotStatus {
        chain
            .status()
            .into_iter()
            .find(|s| s.name == slot)
            .unwrap()
    }

    #[test]
    fn fresh_install_activates_then_exchanges_code() {
        let h = Harness::new();
        h.script_activation("code-1");
        h.script_tokens("access-1", "refresh-1");
        let mut chain = h.chain();

        let token = chain.access_token().unwrap();
        assert_eq!(expose(token), "access-1");

        assert_eq!(h.transport.count("activate"), 1);
        assert_eq!(h.transport.count("requesttoken"), 1);
        // one handshake each for activate and requesttoken
        assert_eq!(h.transport.count("getnonce"), 2);

        let grant = h.transport.last("requesttoken").unwrap();
        assert_eq!(grant.param("grant_type"), Some("authorization_code"));
        assert_eq!(grant.param("code"), Some("code-1"));
        assert_eq!(grant.param("redirect_uri"), Some("https://google.com/"));
        assert!(grant.param("signature").is_some());
        assert!(grant.param("client_secret").is_none());

        let access = state_of(&chain, ACCESS_TOKEN_SLOT);
        assert_eq!(access.state, CredentialState::Valid);
        assert_eq!(access.time_left, Some(3600));
        let refresh = state_of(&chain, REFRESH_TOKEN_SLOT);
        assert_eq!(refresh.state, CredentialState::Valid);
        assert_eq!(refresh.time_left, Some(31_536_000));
        assert_eq!(state_of(&chain, CODE_SLOT).state, CredentialState::Used);

        assert_eq!(h.store.get(ACCESS_TOKEN_SLOT, VALUE_KEY).as_deref(), Some("access-1"));
        assert_eq!(h.store.get(REFRESH_TOKEN_SLOT, VALUE_KEY).as_deref(), Some("refresh-1"));
    }

    #[test]
    fn activation_sends_account_and_devices() {
        let h = Harness::new();
        h.script_activation("code-1");
        h.script_tokens("a", "r");
        let mut chain = h.chain();
        chain.get_access_token().unwrap();

        let activate = h.transport.last("activate").unwrap();
        assert_eq!(activate.method, crate::transport::Method::Post);
        assert_eq!(activate.path, USER_PATH);
        assert_eq!(activate.param("email"), Some("jane@example.com"));
        assert_eq!(
            activate.param("mac_addresses"),
            Some(r#"["00:24:e4:8b:77:3c"]"#)
        );
        assert_eq!(activate.param("preflang"), Some("en_US"));
        assert_eq!(activate.param("nonce"), Some("n1000"));
    }

    #[test]
    fn valid_access_token_is_reused() {
        let h = Harness::new();
        h.script_activation("code-1");
        h.script_tokens("access-1", "refresh-1");
        let mut chain = h.chain();
        chain.access_token().unwrap();

        h.clock.advance(3599);
        let token = chain.access_token().unwrap();
        assert_eq!(expose(token), "access-1");
        assert_eq!(h.transport.count("requesttoken"), 1);
    }

    #[test]
    fn expired_access_token_uses_refresh_grant() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "old-access", T0 - 7200);
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0 - 86_400);
        h.script_tokens("access-2", "refresh-2");
        let batches_before = h.store.batches();
        let mut chain = h.chain();

        let token = chain.access_token().unwrap();
        assert_eq!(expose(token), "access-2");

        assert_eq!(h.transport.count("activate"), 0);
        assert_eq!(h.transport.count("requesttoken"), 1);
        let grant = h.transport.last("requesttoken").unwrap();
        assert_eq!(grant.param("grant_type"), Some("refresh_token"));
        assert_eq!(grant.param("refresh_token"), Some("refresh-0"));

        // both tokens written in a single batch
        assert_eq!(h.store.batches(), batches_before + 1);
        assert_eq!(h.store.get(REFRESH_TOKEN_SLOT, VALUE_KEY).as_deref(), Some("refresh-2"));
        assert_eq!(
            h.store.get(REFRESH_TOKEN_SLOT, TIMESTAMP_KEY).as_deref(),
            Some("1700000000")
        );
        assert_eq!(state_of(&chain, REFRESH_TOKEN_SLOT).time_left, Some(31_536_000));
    }

    #[test]
    fn valid_refresh_token_never_activates() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        let mut chain = h.chain();

        for i in 0..3 {
            h.script_tokens(&format!("a{i}"), &format!("r{i}"));
            chain.get_access_token().unwrap();
            h.clock.advance(4000);
        }
        assert_eq!(h.transport.count("activate"), 0);
        assert_eq!(h.transport.count("requesttoken"), 3);
    }

    #[test]
    fn invalid_refresh_token_activates_once_per_call() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "stale", T0 - REFRESH_TOKEN_TIMEOUT_SECS - 1);
        let mut chain = h.chain();

        h.script_activation("code-1");
        h.script_tokens("a1", "r1");
        chain.get_access_token().unwrap();
        assert_eq!(h.transport.count("activate"), 1);

        // after clearing, the next call has to activate again
        chain.clear().unwrap();
        h.script_activation("code-2");
        h.script_tokens("a2", "r2");
        chain.get_access_token().unwrap();
        assert_eq!(h.transport.count("activate"), 2);

        let codes: Vec<_> = h
            .transport
            .calls()
            .into_iter()
            .filter_map(|c| c.param("code").map(String::from))
            .collect();
        assert_eq!(codes, vec!["code-1", "code-2"]);
    }

    #[test]
    fn explicit_activate_returns_code_without_touching_slots() {
        let h = Harness::new();
        h.script_activation("code-x");
        let chain = h.chain();
        let activation = chain.activate(&["aa:bb:cc:dd:ee:ff".to_string()]).unwrap();
        assert_eq!(expose(activation.code), "code-x");
        assert_eq!(activation.devices.len(), 1);
        assert_eq!(
            h.transport.last("activate").unwrap().param("mac_addresses"),
            Some(r#"["aa:bb:cc:dd:ee:ff"]"#)
        );
        assert_eq!(state_of(&chain, CODE_SLOT).state, CredentialState::Empty);
    }

    #[test]
    fn token_failure_keeps_code_for_retry() {
        let h = Harness::new();
        h.script_activation("code-1");
        h.transport.fail("requesttoken", 503);
        let mut chain = h.chain();

        let err = chain.get_access_token().unwrap_err();
        assert!(matches!(err, Error::VendorApi { status: 503, .. }));
        assert_eq!(state_of(&chain, CODE_SLOT).state, CredentialState::Valid);
        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::Empty);
        assert_eq!(h.store.get(ACCESS_TOKEN_SLOT, VALUE_KEY), None);

        // retry reuses the code instead of activating again
        h.script_tokens("a", "r");
        chain.get_access_token().unwrap();
        assert_eq!(h.transport.count("activate"), 1);
        assert_eq!(
            h.transport.last("requesttoken").unwrap().param("code"),
            Some("code-1")
        );
    }

    #[test]
    fn activation_failure_leaves_slots_unchanged() {
        let h = Harness::new();
        h.transport.fail("activate", 2555);
        let mut chain = h.chain();

        let err = chain.access_token().unwrap_err();
        assert!(matches!(err, Error::VendorApi { status: 2555, .. }));
        assert_eq!(h.transport.count("requesttoken"), 0);
        for slot in chain.status() {
            assert_eq!(slot.state, CredentialState::Empty, "{}", slot.name);
        }
    }

    #[test]
    fn refresh_failure_leaves_tokens_unchanged() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "old-access", T0 - 7200);
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0 - 100);
        h.transport.fail("requesttoken", 601);
        let mut chain = h.chain();

        assert!(chain.get_access_token().is_err());
        assert_eq!(h.store.get(REFRESH_TOKEN_SLOT, VALUE_KEY).as_deref(), Some("refresh-0"));
        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::Expired);
        assert_eq!(state_of(&chain, REFRESH_TOKEN_SLOT).state, CredentialState::Valid);
    }

    #[test]
    fn revoked_refresh_token_falls_back_to_activation() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "revoked", T0);
        h.transport.fail("requesttoken", 401);
        let mut chain = h.chain();

        let err = chain.access_token().unwrap_err();
        assert!(err.is_invalid_token());
        assert_eq!(state_of(&chain, REFRESH_TOKEN_SLOT).state, CredentialState::Empty);
        assert_eq!(h.store.get(REFRESH_TOKEN_SLOT, VALUE_KEY), None);

        h.script_activation("code-1");
        h.script_tokens("a1", "r1");
        assert_eq!(expose(chain.access_token().unwrap()), "a1");
        assert_eq!(h.transport.count("activate"), 1);
        let grant = h.transport.last("requesttoken").unwrap();
        assert_eq!(grant.param("grant_type"), Some("authorization_code"));
    }

    #[test]
    fn nonce_failure_raises_before_grant() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        h.transport.fail("getnonce", 2554);
        let mut chain = h.chain();

        assert!(matches!(
            chain.get_access_token(),
            Err(Error::VendorApi { status: 2554, .. })
        ));
        assert_eq!(h.transport.count("requesttoken"), 0);
    }

    #[test]
    fn missing_secret_is_reported() {
        let h = Harness::new();
        h.store.delete("stetho", "secret").unwrap();
        let mut chain = h.chain();
        assert!(matches!(
            chain.access_token(),
            Err(Error::SecretUnavailable(_))
        ));
        assert!(h.transport.calls().is_empty());
    }

    #[test]
    fn client_secret_grant_skips_handshake() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        h.script_tokens("a", "r");
        let mut chain = h.chain_with(GrantAuth::ClientSecret);

        chain.get_access_token().unwrap();
        let grant = h.transport.last("requesttoken").unwrap();
        assert_eq!(grant.param("client_secret"), Some("s3cr3t"));
        assert!(grant.param("signature").is_none());
        assert_eq!(h.transport.count("getnonce"), 0);
    }

    #[test]
    fn authorized_attaches_bearer() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "access-ok", T0);
        h.transport.ok("list", json!({"series": []}));
        let mut chain = h.chain();

        let body = chain
            .authorized(ApiRequest::get("/v2/stetho").param("action", "list"))
            .unwrap();
        assert_eq!(body, json!({"series": []}));
        assert_eq!(
            h.transport.last("list").unwrap().bearer.as_deref(),
            Some("access-ok")
        );
    }

    #[test]
    fn rejected_token_is_invalidated_and_regenerated() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "revoked", T0);
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        h.transport.fail("list", 401);
        let mut chain = h.chain();

        let err = chain
            .authorized(ApiRequest::get("/v2/stetho").param("action", "list"))
            .unwrap_err();
        assert!(err.is_invalid_token());
        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::Empty);
        assert_eq!(h.store.get(ACCESS_TOKEN_SLOT, VALUE_KEY), None);

        h.script_tokens("fresh", "refresh-1");
        h.transport.ok("list", json!({"series": []}));
        chain
            .authorized(ApiRequest::get("/v2/stetho").param("action", "list"))
            .unwrap();
        assert_eq!(h.transport.last("list").unwrap().bearer.as_deref(), Some("fresh"));
        assert_eq!(h.transport.count("activate"), 0);
    }

    #[test]
    fn other_errors_keep_access_token() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "access-ok", T0);
        h.transport.fail("get", 293);
        let mut chain = h.chain();

        assert!(
            chain
                .authorized(ApiRequest::get("/v2/stetho").param("action", "get"))
                .is_err()
        );
        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::Valid);
    }

    #[test]
    fn unknown_age_access_token_is_regenerated() {
        let h = Harness::new();
        h.store.write(ACCESS_TOKEN_SLOT, VALUE_KEY, "legacy").unwrap();
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        h.script_tokens("a", "r");
        let mut chain = h.chain();

        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::UnknownAge);
        assert_eq!(expose(chain.access_token().unwrap()), "a");
    }

    #[test]
    fn store_failure_leaves_slots_unchanged() {
        let h = Harness::new();
        h.seed(REFRESH_TOKEN_SLOT, "refresh-0", T0);
        h.script_tokens("a", "r");
        let mut chain = h.chain();
        h.store.reject_writes(true);

        assert!(matches!(chain.get_access_token(), Err(Error::Store(_))));
        assert_eq!(state_of(&chain, ACCESS_TOKEN_SLOT).state, CredentialState::Empty);
    }

    #[test]
    fn userid_may_be_string_or_number() {
        let body: TokenBody =
            serde_json::from_value(json!({"access_token": "a", "refresh_token": "r", "userid": "77"}))
                .unwrap();
        assert_eq!(TokenPair::from(body).user_id.as_deref(), Some("77"));

        let body: TokenBody =
            serde_json::from_value(json!({"access_token": "a", "refresh_token": "r", "userid": 77}))
                .unwrap();
        assert_eq!(TokenPair::from(body).user_id.as_deref(), Some("77"));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let h = Harness::new();
        h.seed(ACCESS_TOKEN_SLOT, "very-secret-access", T0);
        let chain = h.chain();
        assert!(!format!("{chain:?}").contains("very-secret-access"));
    }
}
