//! Installation Lock Manager (C11): per-(tenant, namespace) advisory lock
//! serializing install/uninstall. Modeled as a single actor task owning a
//! `HashSet` of held keys, reached over an mpsc channel — the same shape as
//! a database connection actor, just holding in-memory state instead of a
//! non-`Sync` driver handle.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};

type LockKey = (String, String);

enum LockEvent {
    Acquire { key: LockKey, reply: oneshot::Sender<bool> },
    Release { key: LockKey },
}

/// A handle to the lock manager actor. Cheap to clone; every clone shares the
/// same underlying held-set.
#[derive(Clone)]
pub struct LockManager {
    sender: mpsc::Sender<LockEvent>,
}

impl LockManager {
    /// Spawn the actor task and return a handle to it.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::channel::<LockEvent>(64);

        tokio::spawn(async move {
            let mut held: HashSet<LockKey> = HashSet::new();
            while let Some(event) = receiver.recv().await {
                match event {
                    LockEvent::Acquire { key, reply } => {
                        let acquired = held.insert(key);
                        let _ = reply.send(acquired);
                    }
                    LockEvent::Release { key } => {
                        held.remove(&key);
                    }
                }
            }
        });

        Self { sender }
    }

    /// Attempt to acquire the lock for `(tenant, namespace)`. Returns `false`
    /// if another holder already has it. Callers must not nest acquisitions
    /// for the same key from the same task: reentrancy is not supported and
    /// will deadlock against this actor's single in-flight acquire semantics.
    pub async fn acquire(&self, tenant: &str, namespace: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let key = (tenant.to_string(), namespace.to_string());
        if self.sender.send(LockEvent::Acquire { key, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Release a previously acquired lock. Releasing a key that is not held
    /// is a no-op.
    pub async fn release(&self, tenant: &str, namespace: &str) {
        let key = (tenant.to_string(), namespace.to_string());
        let _ = self.sender.send(LockEvent::Release { key }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_for_same_key_is_refused() {
        let locks = LockManager::spawn();
        assert!(locks.acquire("t1", "ns1").await);
        assert!(!locks.acquire("t1", "ns1").await);
    }

    #[tokio::test]
    async fn release_allows_a_subsequent_acquire() {
        let locks = LockManager::spawn();
        assert!(locks.acquire("t1", "ns1").await);
        locks.release("t1", "ns1").await;
        assert!(locks.acquire("t1", "ns1").await);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = LockManager::spawn();
        assert!(locks.acquire("t1", "ns1").await);
        assert!(locks.acquire("t1", "ns2").await);
    }
}
