use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::{AuthCallback, AuthProvider, ProviderHandle};
use crate::profile::AccountId;

type Listener = Arc<dyn Fn(Option<AccountId>) + Send + Sync>;

#[derive(Default)]
struct State {
    current: Option<AccountId>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    // Serializes notifications so listeners observe changes in the order they happened.
    notify: Mutex<()>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Auth provider driven by explicit `sign_in` / `sign_out` calls.
///
/// For hosts that relay their own authentication events into the core (mobile
/// apps through FFI, the CLI, tests).
#[derive(Clone, Default)]
pub struct ManualAuthProvider {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ManualAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualAuthProvider")
            .field("current", &self.inner.state().current)
            .finish_non_exhaustive()
    }
}

impl ManualAuthProvider {
    /// A provider with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that starts with `account_id` signed in.
    pub fn signed_in(account_id: impl Into<AccountId>) -> Self {
        let provider = Self::new();
        provider.inner.state().current = Some(account_id.into());
        provider
    }

    /// Signs `account_id` in and notifies listeners.
    pub fn sign_in(&self, account_id: impl Into<AccountId>) {
        self.emit(Some(account_id.into()));
    }

    /// Signs out and notifies listeners.
    pub fn sign_out(&self) {
        self.emit(None);
    }

    /// Re-announces the current state without changing it, as providers do on
    /// token refresh.
    pub fn refresh(&self) {
        let current = self.inner.state().current.clone();
        self.emit(current);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.state().listeners.len()
    }

    fn emit(&self, account_id: Option<AccountId>) {
        let _order = self
            .inner
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let listeners: Vec<Listener> = {
            let mut state = self.inner.state();
            state.current.clone_from(&account_id);
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(account_id.clone());
        }
    }
}

impl AuthProvider for ManualAuthProvider {
    fn current_account_id(&self) -> Option<AccountId> {
        self.inner.state().current.clone()
    }

    fn on_auth_state_change(&self, callback: AuthCallback) -> ProviderHandle {
        let id = {
            let mut state = self.inner.state();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.push((id, Arc::from(callback)));
            id
        };

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        ProviderHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.state().listeners.retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }
}
