//! A single endpoint bound to one normalized path (§4.2).

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::frame::EMPTY_UNMASKED_PING;
use crate::registry::SessionRegistry;
use crate::state::{State, StateCell};

/// A parameterless constructor for a per-connection behavior object. The
/// core treats the result as opaque; the acceptor downcasts it to whatever
/// concrete type it registered the host with.
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// One endpoint: a path, its session table, its own slice of the
/// manager's lifecycle, and the idle sweeper that `keep_clean` authorizes.
pub struct ServiceHost {
    path: String,
    fragment_size: usize,
    wait_time_ms: AtomicU64,
    keep_clean: bool,
    state: StateCell,
    sessions: Arc<SessionRegistry>,
    behavior_factory: BehaviorFactory,
    sweeper: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ServiceHost {
    pub fn new(
        path: String,
        fragment_size: usize,
        wait_time: Duration,
        keep_clean: bool,
        behavior_factory: BehaviorFactory,
    ) -> Self {
        Self {
            path,
            fragment_size,
            wait_time_ms: AtomicU64::new(wait_time.as_millis() as u64),
            keep_clean,
            state: StateCell::new(State::Ready),
            sessions: Arc::new(SessionRegistry::new()),
            behavior_factory,
            sweeper: AsyncMutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms.load(Ordering::SeqCst))
    }

    pub fn set_wait_time(&self, wait_time: Duration) {
        self.wait_time_ms
            .store(wait_time.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn keep_clean(&self) -> bool {
        self.keep_clean
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn behavior_factory(&self) -> &BehaviorFactory {
        &self.behavior_factory
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Marks the host Started and, if `keep_clean` is set, spawns the
    /// background sweeper that pings every open session once per
    /// wait-time interval and drops the ones that don't answer.
    pub async fn start(self: &Arc<Self>) {
        self.state.advance_to(State::Start);
        if !self.keep_clean {
            return;
        }
        let host = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let wait = host.wait_time();
                tokio::time::sleep(wait).await;
                if host.state() != State::Start {
                    return;
                }
                let results = host
                    .sessions
                    .broadping(Bytes::from_static(EMPTY_UNMASKED_PING), wait)
                    .await;
                for (session_id, replied) in results {
                    if !replied {
                        host.sessions.remove(&session_id).await;
                    }
                }
            }
        });
        *self.sweeper.lock().await = Some(handle);
    }

    /// Advances past Start, aborts the sweeper, and hands off to the
    /// registry's own close-and-drain.
    pub async fn stop(&self, close_frame: Option<Bytes>, timeout: Duration) {
        self.state.advance_to(State::ShuttingDown);
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        self.sessions.stop(close_frame, timeout).await;
        self.state.advance_to(State::Stop);
    }
}
