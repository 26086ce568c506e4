//! On-device fallback for user records, one JSON file per user id.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::models::UserProgress;

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

/// Percent-encodes anything but `[A-Za-z0-9_-]`, so distinct ids never
/// share a file and none can escape the directory.
fn file_name(user_id: &str) -> String {
    let mut name = String::with_capacity(user_id.len() + 5);
    for b in user_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            name.push(b as char);
        } else {
            name.push_str(&format!("%{:02X}", b));
        }
    }
    name.push_str(".json");
    name
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(file_name(user_id))
    }

    pub async fn load(&self, user_id: &str) -> anyhow::Result<Option<UserProgress>> {
        let path = self.path_for(user_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let user = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(user))
    }

    /// Writes through a temporary file so a crash never leaves half a record.
    pub async fn save(&self, user: &UserProgress) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.path_for(&user.user_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(user)?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Drops a record once it has reached the database. Missing is fine.
    pub async fn remove(&self, user_id: &str) -> anyhow::Result<()> {
        let path = self.path_for(user_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
