use crate::db::Database;
use crate::errors::{JournalError, JournalResult};
use crate::journal::{read_month_grid, run_blocking};
use crate::models::{MonthGrid, MonthKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

const GRID_CHANNEL_CAPACITY: usize = 16;

/// Live view of one month. Yields the grid once on open and again after
/// every write that touches the month.
///
/// Dropping or cancelling the handle stops the background task and closes
/// the channel, so nothing is delivered afterwards.
#[derive(Debug)]
pub struct MonthSubscription {
    id: String,
    month: MonthKey,
    receiver: mpsc::Receiver<MonthGrid>,
    task: JoinHandle<()>,
    manager: SubscriptionManager,
}

impl MonthSubscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub async fn recv(&mut self) -> Option<MonthGrid> {
        self.receiver.recv().await
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for MonthSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.receiver.close();
        self.manager.release(&self.id);
        tracing::debug!(subscription_id = %self.id, month = %self.month, "month subscription released");
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionManager {
    subscriptions: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn open(&self, db: Arc<Database>, month: MonthKey) -> JournalResult<MonthSubscription> {
        let mut subscriptions = self.registry()?;
        let id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel::<MonthGrid>(GRID_CHANNEL_CAPACITY);
        // Subscribe before the first read so no write slips between them.
        let changes = db.subscribe_changes();

        let task = tokio::spawn(watch_month(db, month, changes, sender, id.clone()));
        subscriptions.insert(id.clone(), task.abort_handle());
        drop(subscriptions);
        tracing::debug!(subscription_id = %id, %month, "month subscription opened");

        Ok(MonthSubscription {
            id,
            month,
            receiver,
            task,
            manager: self.clone(),
        })
    }

    pub fn active_count(&self) -> JournalResult<usize> {
        Ok(self.registry()?.len())
    }

    /// Stops every live subscription; their handles then yield `None`.
    pub fn close_all(&self) -> JournalResult<()> {
        for (_, handle) in self.registry()?.drain() {
            handle.abort();
        }
        Ok(())
    }

    fn release(&self, id: &str) {
        match self.registry() {
            Ok(mut subscriptions) => {
                subscriptions.remove(id);
            }
            Err(error) => {
                tracing::warn!(subscription_id = %id, error = %error, "subscription registry unavailable on release");
            }
        }
    }

    fn registry(&self) -> JournalResult<MutexGuard<'_, HashMap<String, AbortHandle>>> {
        self.subscriptions
            .lock()
            .map_err(|_| JournalError::Internal("subscription registry lock poisoned".to_string()))
    }
}

async fn watch_month(
    db: Arc<Database>,
    month: MonthKey,
    mut changes: tokio::sync::broadcast::Receiver<crate::models::StoreChange>,
    sender: mpsc::Sender<MonthGrid>,
    id: String,
) {
    loop {
        match run_blocking(&db, move |db| read_month_grid(db, month)).await {
            Ok(grid) => {
                if sender.send(grid).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(subscription_id = %id, %month, error = %error, "month refresh failed");
            }
        }

        loop {
            match changes.recv().await {
                Ok(change) if month.contains(change.date()) => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription_id = %id, skipped, "month subscription lagged, reloading");
                    break;
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionManager;
    use crate::db::Database;
    use crate::errors::JournalError;
    use crate::models::MonthKey;
    use std::sync::Arc;

    fn poison(manager: &SubscriptionManager) {
        let registry = manager.subscriptions.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = registry.lock().expect("lock");
            panic!("holder panicked");
        })
        .join();
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn poisoned_registry_reports_internal_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("journal.sqlite3")).expect("db"));
        let month = MonthKey::new(2024, 5).expect("month");
        let manager = SubscriptionManager::new();

        let existing = manager.open(db.clone(), month).expect("open");
        assert_eq!(manager.active_count().expect("count"), 1);
        poison(&manager);

        assert!(matches!(manager.active_count(), Err(JournalError::Internal(_))));
        assert!(matches!(manager.close_all(), Err(JournalError::Internal(_))));
        assert!(matches!(manager.open(db, month), Err(JournalError::Internal(_))));
        // Releasing against a poisoned registry logs instead of panicking.
        existing.cancel();
    }
}
