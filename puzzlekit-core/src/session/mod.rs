//! Session watching: normalizes the authentication provider's notifications
//! into one `SignedIn` / `SignedOut` event per real transition.

mod manual;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

pub use manual::ManualAuthProvider;

use crate::profile::AccountId;

/// Callback registered with an [`AuthProvider`].
pub type AuthCallback = Box<dyn Fn(Option<AccountId>) + Send + Sync>;

/// The external authentication provider, reduced to what the core consumes.
///
/// The provider must update the value returned by `current_account_id`
/// before it invokes callbacks for that change.
pub trait AuthProvider: Send + Sync {
    /// The signed-in account right now, if any.
    fn current_account_id(&self) -> Option<AccountId>;

    /// Registers `callback` for every auth state notification. Providers may
    /// repeat notifications (e.g. on token refresh); the watcher filters them.
    fn on_auth_state_change(&self, callback: AuthCallback) -> ProviderHandle;
}

/// Unsubscribe handle returned by [`AuthProvider::on_auth_state_change`].
///
/// Dropping the handle unsubscribes.
pub struct ProviderHandle {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl ProviderHandle {
    /// Wraps the provider-specific unsubscribe action.
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A handle with nothing to undo.
    #[must_use]
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    /// Detaches the callback now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.run();
    }
}

/// A normalized session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An account is signed in.
    SignedIn(AccountId),
    /// No account is signed in.
    SignedOut,
}

impl SessionEvent {
    /// The signed-in account, if any.
    #[must_use]
    pub const fn account_id(&self) -> Option<&AccountId> {
        match self {
            Self::SignedIn(account_id) => Some(account_id),
            Self::SignedOut => None,
        }
    }
}

impl From<Option<AccountId>> for SessionEvent {
    fn from(account_id: Option<AccountId>) -> Self {
        account_id.map_or(Self::SignedOut, Self::SignedIn)
    }
}

type EventSink = Box<dyn Fn(SessionEvent) + Send + Sync>;

struct Delivery {
    on_change: EventSink,
    started: bool,
    last: Option<SessionEvent>,
}

impl Delivery {
    fn offer(&mut self, event: SessionEvent) {
        // Anything before the snapshot is already reflected in it.
        if !self.started {
            return;
        }
        if self.last.as_ref() == Some(&event) {
            tracing::trace!(?event, "suppressing repeated auth notification");
            return;
        }
        self.last = Some(event.clone());
        (self.on_change)(event);
    }
}

fn lock(delivery: &Mutex<Delivery>) -> MutexGuard<'_, Delivery> {
    delivery.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Adapter over an [`AuthProvider`] delivering an initial snapshot followed by
/// exactly one event per transition.
#[derive(Clone)]
pub struct SessionWatcher {
    provider: Arc<dyn AuthProvider>,
}

impl std::fmt::Debug for SessionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWatcher").finish_non_exhaustive()
    }
}

impl SessionWatcher {
    /// Creates a watcher over `provider`.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Point-in-time snapshot of the signed-in account.
    #[must_use]
    pub fn current(&self) -> Option<AccountId> {
        self.provider.current_account_id()
    }

    /// Calls `on_change` with the current state, then once per transition,
    /// until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        let delivery = Arc::new(Mutex::new(Delivery {
            on_change: Box::new(on_change),
            started: false,
            last: None,
        }));

        let sink = Arc::clone(&delivery);
        let handle = self
            .provider
            .on_auth_state_change(Box::new(move |account_id| {
                lock(&sink).offer(SessionEvent::from(account_id));
            }));

        // The snapshot is read while holding the delivery lock: a notification
        // racing with it either lands before (and is covered by the snapshot)
        // or waits and is then compared against it.
        {
            let mut delivery = lock(&delivery);
            let snapshot = SessionEvent::from(self.provider.current_account_id());
            tracing::debug!(?snapshot, "session snapshot");
            delivery.started = true;
            delivery.last = Some(snapshot.clone());
            (delivery.on_change)(snapshot);
        }

        Subscription { handle }
    }

    /// Subscribes and exposes the normalized events as an async stream.
    #[must_use]
    pub fn events(&self) -> SessionEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            if tx.send(event).is_err() {
                tracing::trace!("session event receiver dropped");
            }
        });
        SessionEvents {
            rx,
            _subscription: subscription,
        }
    }
}

/// Keeps a [`SessionWatcher::subscribe`] callback registered.
pub struct Subscription {
    handle: ProviderHandle,
}

impl Subscription {
    /// Stops delivery.
    pub fn unsubscribe(self) {
        self.handle.unsubscribe();
    }
}

/// Ordered stream of session events, starting with the snapshot.
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    _subscription: Subscription,
}

impl SessionEvents {
    /// Waits for the next event. Returns `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<SessionEvent>>>, impl Fn(SessionEvent) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event| sink.lock().unwrap().push(event))
    }

    #[test]
    fn test_initial_snapshot_signed_out() {
        let provider = Arc::new(ManualAuthProvider::new());
        let watcher = SessionWatcher::new(provider);
        let (seen, sink) = recorder();

        let _subscription = watcher.subscribe(sink);
        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::SignedOut]);
    }

    #[test]
    fn test_initial_snapshot_signed_in() {
        let provider = Arc::new(ManualAuthProvider::signed_in("acct-1"));
        let watcher = SessionWatcher::new(provider);
        assert_eq!(watcher.current(), Some(AccountId::from("acct-1")));

        let (seen, sink) = recorder();
        let _subscription = watcher.subscribe(sink);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionEvent::SignedIn("acct-1".into())]
        );
    }

    #[test]
    fn test_one_event_per_transition() {
        let provider = Arc::new(ManualAuthProvider::new());
        let watcher = SessionWatcher::new(provider.clone());
        let (seen, sink) = recorder();
        let _subscription = watcher.subscribe(sink);

        provider.sign_in("acct-1");
        provider.sign_in("acct-1");
        provider.refresh();
        provider.sign_out();
        provider.sign_out();
        provider.sign_in("acct-2");
        provider.sign_in("acct-3");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionEvent::SignedOut,
                SessionEvent::SignedIn("acct-1".into()),
                SessionEvent::SignedOut,
                SessionEvent::SignedIn("acct-2".into()),
                SessionEvent::SignedIn("acct-3".into()),
            ]
        );
    }

    /// Signs in while the watcher registers, before it reads the snapshot.
    #[derive(Default)]
    struct SignInOnRegister {
        current: Mutex<Option<AccountId>>,
        callback: Mutex<Option<AuthCallback>>,
    }

    impl SignInOnRegister {
        fn notify(&self) {
            let current = self.current.lock().unwrap().clone();
            if let Some(callback) = self.callback.lock().unwrap().as_ref() {
                callback(current);
            }
        }
    }

    impl AuthProvider for SignInOnRegister {
        fn current_account_id(&self) -> Option<AccountId> {
            self.current.lock().unwrap().clone()
        }

        fn on_auth_state_change(&self, callback: AuthCallback) -> ProviderHandle {
            *self.current.lock().unwrap() = Some("acct-1".into());
            callback(Some("acct-1".into()));
            *self.callback.lock().unwrap() = Some(callback);
            ProviderHandle::noop()
        }
    }

    #[test]
    fn test_transition_during_registration_is_not_lost() {
        let provider = Arc::new(SignInOnRegister::default());
        let watcher = SessionWatcher::new(provider.clone());
        let (seen, sink) = recorder();

        let _subscription = watcher.subscribe(sink);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionEvent::SignedIn("acct-1".into())]
        );

        // A late repeat of the same notification is not a new transition.
        provider.notify();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let provider = Arc::new(ManualAuthProvider::new());
        let watcher = SessionWatcher::new(provider.clone());
        let (seen, sink) = recorder();

        let subscription = watcher.subscribe(sink);
        assert_eq!(provider.listener_count(), 1);
        subscription.unsubscribe();
        assert_eq!(provider.listener_count(), 0);

        provider.sign_in("acct-1");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_event_stream() {
        let provider = Arc::new(ManualAuthProvider::new());
        let watcher = SessionWatcher::new(provider.clone());
        let mut events = watcher.events();

        provider.sign_in("acct-1");
        provider.sign_out();

        assert_eq!(events.next().await, Some(SessionEvent::SignedOut));
        assert_eq!(
            events.next().await,
            Some(SessionEvent::SignedIn("acct-1".into()))
        );
        assert_eq!(events.next().await, Some(SessionEvent::SignedOut));
        assert_eq!(events.try_next(), None);
    }

    #[test]
    fn test_noop_handle() {
        ProviderHandle::noop().unsubscribe();
        assert_eq!(SessionEvent::from(None), SessionEvent::SignedOut);
        assert_eq!(
            SessionEvent::SignedIn("a".into()).account_id(),
            Some(&AccountId::from("a"))
        );
    }
}
