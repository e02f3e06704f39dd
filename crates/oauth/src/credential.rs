//! Named credential that ages out after a timeout or a single use.
//!
//! Every value is persisted under `(name, "value")` and `(name, "timestamp")`
//! as soon as it is set. Reads go through [`ExpiringCredential::resolve`],
//! which regenerates the value through a producer when it is no longer valid.

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::{
    error::Result,
    store::{CredentialStore, StoreEntry, TIMESTAMP_KEY, VALUE_KEY},
};

/// Stored timestamps at or beyond this many seconds are treated as garbage.
const MAX_TIMESTAMP: f64 = 1e15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No value stored.
    Empty,
    Valid,
    /// Older than its timeout.
    Expired,
    /// Single-use credential already consumed.
    Used,
    /// Value present but its issue time is unknown.
    UnknownAge,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Used => "used",
            Self::UnknownAge => "unknown age",
        })
    }
}

pub struct ExpiringCredential {
    name: String,
    value: Option<Secret<String>>,
    issued_at: Option<i64>,
    timeout_secs: i64,
    single_use: bool,
    was_used: bool,
}

impl std::fmt::Debug for ExpiringCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCredential")
            .field("name", &self.name)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .field("issued_at", &self.issued_at)
            .field("timeout_secs", &self.timeout_secs)
            .field("single_use", &self.single_use)
            .field("was_used", &self.was_used)
            .finish()
    }
}

impl ExpiringCredential {
    /// An empty credential; call [`Self::load`] to pick up a persisted value.
    pub fn new(name: impl Into<String>, timeout_secs: i64) -> Self {
        Self {
            name: name.into(),
            value: None,
            issued_at: None,
            timeout_secs,
            single_use: false,
            was_used: false,
        }
    }

    /// Mark the credential as consumable once.
    #[must_use]
    pub fn single_use(mut self) -> Self {
        self.single_use = true;
        self
    }

    /// Read any persisted value and timestamp for this credential.
    pub fn load(mut self, store: &dyn CredentialStore, now: i64) -> Result<Self> {
        self.value = store.read(&self.name, VALUE_KEY)?.map(Secret::new);
        self.issued_at = match store.read(&self.name, TIMESTAMP_KEY)? {
            Some(raw) => match raw.trim().parse::<f64>() {
                // older stores wrote float seconds
                Ok(ts) if ts.is_finite() && ts.abs() < MAX_TIMESTAMP => Some(ts as i64),
                _ => {
                    warn!(credential = %self.name, raw = %raw, "ignoring unparsable timestamp");
                    None
                },
            },
            None => None,
        };

        match self.state(now) {
            CredentialState::Empty => {},
            CredentialState::Valid => info!(
                credential = %self.name,
                time_left = self.time_left(now).unwrap_or_default(),
                "found stored credential"
            ),
            state => info!(credential = %self.name, %state, "found stored credential, not usable"),
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    pub fn state(&self, now: i64) -> CredentialState {
        if self.value.is_none() {
            return CredentialState::Empty;
        }
        let Some(issued_at) = self.issued_at else {
            return CredentialState::UnknownAge;
        };
        if self.was_used {
            CredentialState::Used
        } else if now.saturating_sub(issued_at) > self.timeout_secs {
            CredentialState::Expired
        } else {
            CredentialState::Valid
        }
    }

    pub fn is_valid(&self, now: i64) -> bool {
        self.state(now) == CredentialState::Valid
    }

    /// Seconds until expiry; negative once expired, `None` without a timestamp.
    pub fn time_left(&self, now: i64) -> Option<i64> {
        self.issued_at
            .map(|issued_at| self.timeout_secs.saturating_sub(now.saturating_sub(issued_at)))
    }

    /// The stored value when it is still valid.
    pub fn valid_value(&self, now: i64) -> Option<Secret<String>> {
        if !self.is_valid(now) {
            return None;
        }
        self.value
            .as_ref()
            .map(|v| Secret::new(v.expose_secret().clone()))
    }

    /// Return the value, regenerating it through `producer` when it is not valid.
    ///
    /// The producer may freely read or write sibling credentials; a failing
    /// producer leaves this credential untouched.
    pub fn resolve<F>(
        &mut self,
        store: &dyn CredentialStore,
        now: i64,
        producer: F,
    ) -> Result<Secret<String>>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some(value) = self.valid_value(now) {
            return Ok(value);
        }

        debug!(credential = %self.name, state = %self.state(now), "regenerating credential");
        let fresh = producer()?;
        let returned = Secret::new(fresh.clone());
        self.set(store, fresh, now)?;
        Ok(returned)
    }

    /// Store a new value issued at `now` and persist it immediately.
    pub fn set(&mut self, store: &dyn CredentialStore, value: String, now: i64) -> Result<()> {
        store.write_batch(&self.entries_for(&value, now))?;
        self.apply(value, now);
        Ok(())
    }

    /// The store records [`Self::set`] would write, for batching with siblings.
    pub fn entries_for(&self, value: &str, now: i64) -> [StoreEntry; 2] {
        [
            StoreEntry::new(&self.name, VALUE_KEY, value),
            StoreEntry::new(&self.name, TIMESTAMP_KEY, now.to_string()),
        ]
    }

    /// In-memory half of [`Self::set`]; callers must have persisted
    /// [`Self::entries_for`] already.
    pub fn apply(&mut self, value: String, now: i64) {
        self.value = Some(Secret::new(value));
        self.issued_at = Some(now);
        self.was_used = false;
    }

    /// Flag a single-use credential as consumed.
    pub fn mark_used(&mut self) {
        if self.single_use {
            self.was_used = true;
        }
    }

    /// Forget the value, in memory and in the store, so the next resolve regenerates it.
    pub fn invalidate(&mut self, store: &dyn CredentialStore) -> Result<()> {
        store.delete(&self.name, VALUE_KEY)?;
        store.delete(&self.name, TIMESTAMP_KEY)?;
        self.value = None;
        self.issued_at = None;
        self.was_used = false;
        Ok(())
    }
}
