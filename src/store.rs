use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::Db;
use crate::error::UnlockError;
use crate::local_store::LocalStore;
use crate::models::{UnlockReceipt, UserProgress};

/// User records in the database, degrading to the local store.
///
/// Nothing here fails the caller: read errors fall back to the local copy
/// (or a fresh record) and write errors fall back to a local write. A local
/// copy left by an outage is folded into the database record on the next
/// load and removed once the database has it. Each user id has one async
/// lock, so load-modify-save for a single user never interleaves inside
/// this process.
pub struct ProgressStore {
    db: Option<Db>,
    local: LocalStore,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProgressStore {
    pub fn new(db: Option<Db>, local: LocalStore) -> Self {
        Self {
            db,
            local,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn load_local(&self, user_id: &str) -> UserProgress {
        match self.local.load(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => UserProgress::new(user_id),
            Err(e) => {
                warn!("local record for {} unreadable, starting fresh: {:#}", user_id, e);
                UserProgress::new(user_id)
            }
        }
    }

    pub async fn load(&self, user_id: &str) -> UserProgress {
        let _guard = self.lock_user(user_id).await;
        self.load_locked(user_id).await
    }

    /// Caller holds the user's lock.
    async fn load_locked(&self, user_id: &str) -> UserProgress {
        let Some(db) = &self.db else {
            return self.load_local(user_id).await;
        };
        match db.load_user(user_id).await {
            Ok(Some(mut user)) => {
                match self.local.load(user_id).await {
                    Ok(Some(local)) => {
                        info!("merging local record for {} into the database", user_id);
                        user.absorb(local);
                        self.save_db(db, &user).await;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("local record for {} unreadable, ignoring it: {:#}", user_id, e),
                }
                user
            }
            Ok(None) => self.load_local(user_id).await,
            Err(e) => {
                warn!("loading {} from database failed, using local copy: {:#}", user_id, e);
                self.load_local(user_id).await
            }
        }
    }

    /// Writes to the database, clearing any local copy it now supersedes.
    async fn save_db(&self, db: &Db, user: &UserProgress) -> bool {
        match db.save_user(user).await {
            Ok(()) => {
                if let Err(e) = self.local.remove(&user.user_id).await {
                    warn!("stale local record for {} not removed: {:#}", user.user_id, e);
                }
                true
            }
            Err(e) => {
                warn!("saving {} to database failed, writing locally: {:#}", user.user_id, e);
                false
            }
        }
    }

    pub async fn save(&self, user: &UserProgress) {
        if let Some(db) = &self.db {
            if self.save_db(db, user).await {
                return;
            }
        }
        if let Err(e) = self.local.save(user).await {
            warn!("local write for {} failed, update kept in memory only: {:#}", user.user_id, e);
        }
    }

    /// Loads, mutates and saves one user's record while holding their lock.
    /// Returns the record as saved together with the closure's result.
    pub async fn update<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserProgress) -> T,
    ) -> (UserProgress, T) {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.load_locked(user_id).await;
        let out = f(&mut user);
        self.save(&user).await;
        (user, out)
    }

    /// Like `update`, but an `Err` from `f` leaves the stored record as it was.
    pub async fn try_update<T, E>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserProgress) -> Result<T, E>,
    ) -> Result<(UserProgress, T), E> {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.load_locked(user_id).await;
        let out = f(&mut user)?;
        self.save(&user).await;
        Ok((user, out))
    }

    /// Spends `cost` points to open `module_id`. The check and the
    /// deduction happen as one step: a conditional update in the database,
    /// or the exclusive record when only the local store is reachable.
    pub async fn unlock_module(
        &self,
        user_id: &str,
        module_id: &str,
        cost: u32,
    ) -> Result<UnlockReceipt, UnlockError> {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.load_locked(user_id).await;

        if let Some(db) = &self.db {
            match db.spend_points(&user, module_id, cost).await {
                Ok(outcome) => return outcome,
                Err(e) => warn!("unlock for {} falls back to local record: {:#}", user_id, e),
            }
        }

        let receipt = user.spend_for_unlock(module_id, cost)?;
        if let Err(e) = self.local.save(&user).await {
            warn!("local write for {} failed: {:#}", user_id, e);
            return Err(UnlockError::Storage(e.to_string()));
        }
        Ok(receipt)
    }
}
