// Session - ephemeral handshake state and the session table
//
// Session IDs are uniform random u32 values from the thread CSPRNG.
// The table is guarded by a single mutex; entries are Arc'd so a
// handler that looked one up keeps it alive even if the TTL purge
// lands mid-handshake.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{thread_rng, RngCore};

use styx_shared::auth::ServerSession;

/// How many random IDs to try before giving up on a saturated table
const CREATE_RETRIES: usize = 8;

/// A handshake advances linearly; a packet that arrives for a session
/// in the wrong stage is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    AwaitEphemeral,
    AwaitProof,
    Done,
    Failed,
}

/// One in-flight handshake: the SRP state plus its stage
pub struct AuthSession {
    pub srp: ServerSession,
    pub stage: SessionStage,
}

pub struct SessionManager {
    ttl: Duration,
    sessions: Mutex<HashMap<u32, Arc<Mutex<AuthSession>>>>,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(SessionManager {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Insert a new session under a fresh random ID and arm its TTL
    /// purge. Returns None if every drawn ID collided.
    pub fn create(self: &Arc<Self>, srp: ServerSession) -> Option<u32> {
        let entry = Arc::new(Mutex::new(AuthSession {
            srp,
            stage: SessionStage::AwaitEphemeral,
        }));

        let id = {
            let mut rng = thread_rng();
            let mut table = self.sessions.lock();
            let mut chosen = None;
            for _ in 0..CREATE_RETRIES {
                let id = rng.next_u32();
                if let Entry::Vacant(slot) = table.entry(id) {
                    slot.insert(entry.clone());
                    chosen = Some(id);
                    break;
                }
            }
            chosen?
        };

        let manager = Arc::clone(self);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            manager.remove(id);
        });

        Some(id)
    }

    /// Fetch a live session; the caller holds it past any purge
    pub fn lookup(&self, id: u32) -> Option<Arc<Mutex<AuthSession>>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Drop a session. Removing an absent ID is a no-op.
    pub fn remove(&self, id: u32) {
        self.sessions.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
