//! Access to the bearer token sent with each request.
//!
//! The client only reads and clears the token; obtaining and persisting it is
//! the host application's business. Implement [`CredentialStore`] over whatever
//! storage the application uses, or use [`MemoryCredentialStore`].

use std::sync::RwLock;

/// A key-value slot holding the current credential token.
///
/// `get` is called at the start of every attempt and `clear` when a request is
/// answered with `401 Unauthorized`. Clearing an empty store must be a no-op.
pub trait CredentialStore: Send + Sync {
    /// Returns the current token, if any.
    fn get(&self) -> Option<String>;

    /// Forgets the current token.
    fn clear(&self);
}

/// An in-process token slot.
///
/// # Examples
///
/// ```
/// use apiary::{CredentialStore, MemoryCredentialStore};
///
/// let store = MemoryCredentialStore::with_token("secret");
/// assert_eq!(store.get().as_deref(), Some("secret"));
///
/// store.clear();
/// assert_eq!(store.get(), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Replaces the stored token, e.g. after a successful login.
    pub fn set(&self, token: impl Into<String>) {
        // A poisoned lock still holds a usable Option.
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
