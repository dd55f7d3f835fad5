#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use puzzlekit_core::remote::{MemoryProfileStore, RemoteProfileStore};
use puzzlekit_core::session::{ManualAuthProvider, SessionWatcher};
use puzzlekit_core::storage::{LocalProfileStore, MemorySlotStore, DEFAULT_GUEST_SLOT};
use puzzlekit_core::{IdentityCoordinator, SessionSnapshot, SubmissionGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("puzzlekit_core=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// One device: a guest slot store shared by every client started on it, plus
/// the remote store shared by every device.
pub struct Device {
    pub slots: Arc<MemorySlotStore>,
    pub remote: Arc<dyn RemoteProfileStore>,
}

impl Device {
    pub fn new(remote: Arc<dyn RemoteProfileStore>) -> Self {
        init_tracing();
        Self {
            slots: Arc::new(MemorySlotStore::new()),
            remote,
        }
    }

    pub fn with_memory_remote() -> (Self, Arc<MemoryProfileStore>) {
        let remote = Arc::new(MemoryProfileStore::new());
        (Self::new(remote.clone()), remote)
    }

    /// Starts a client (an app launch or page load) on this device.
    pub fn launch(&self, auth: &ManualAuthProvider) -> Client {
        let local = LocalProfileStore::new(self.slots.clone(), DEFAULT_GUEST_SLOT);
        let coordinator = Arc::new(IdentityCoordinator::new(local, Arc::clone(&self.remote)));
        let guard = SubmissionGuard::new(Arc::clone(&coordinator));
        let snapshots = coordinator.subscribe();

        let watcher = SessionWatcher::new(Arc::new(auth.clone()));
        let events = watcher.events();
        let runner = Arc::clone(&coordinator);
        let session_loop = tokio::spawn(async move { runner.run(events).await });

        Client {
            coordinator,
            guard,
            snapshots,
            session_loop,
        }
    }

    pub fn guest_slot(&self) -> Option<Vec<u8>> {
        self.slots.get_raw(DEFAULT_GUEST_SLOT)
    }
}

pub struct Client {
    pub coordinator: Arc<IdentityCoordinator>,
    pub guard: SubmissionGuard,
    pub snapshots: watch::Receiver<SessionSnapshot>,
    session_loop: JoinHandle<()>,
}

impl Client {
    /// Waits until the published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        tokio::time::timeout(Duration::from_secs(5), self.snapshots.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("coordinator dropped")
            .clone()
    }

    pub async fn wait_ready(&mut self) -> SessionSnapshot {
        self.wait_for(SessionSnapshot::is_ready).await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session_loop.abort();
    }
}
