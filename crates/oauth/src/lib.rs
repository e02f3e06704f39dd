//! Credential lifecycle for the vendor API: shared secret, signed nonce
//! handshake, and the activation code → access token → refresh token chain.

pub mod chain;
pub mod clock;
pub mod credential;
pub mod error;
pub mod secret;
pub mod signature;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use {
    chain::{Activation, ChainSettings, CredentialChain, SlotStatus, TokenPair},
    clock::{Clock, ManualClock, SystemClock},
    credential::{CredentialState, ExpiringCredential},
    error::{Error, Result},
    secret::{ConsolePrompt, NoPrompt, SecretProvider, SecretStore},
    signature::{Nonce, SignatureHandshake, signature},
    store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreEntry, StoreError},
    transport::{ApiRequest, HttpTransport, Method, Transport, call, call_as},
};
