//! Session storage.
//!
//! Holds the identifiers of the signed-in actor (access token, user id,
//! provider id, cookie header). The file-backed store keeps them in
//! `<base>/session.json` with restricted permissions (0600).
//! Tokens are never logged or displayed in full.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// Named slot in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    AccessToken,
    UserId,
    ProviderId,
    /// Raw `Cookie` header value replayed on cookie-authenticated requests.
    Cookie,
}

impl SessionKey {
    pub fn all() -> &'static [SessionKey] {
        &[
            SessionKey::AccessToken,
            SessionKey::UserId,
            SessionKey::ProviderId,
            SessionKey::Cookie,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::AccessToken => "accessToken",
            SessionKey::UserId => "userId",
            SessionKey::ProviderId => "providerId",
            SessionKey::Cookie => "cookie",
        }
    }

    /// Whether the value is a credential that must be masked on display.
    pub fn is_secret(self) -> bool {
        matches!(self, SessionKey::AccessToken | SessionKey::Cookie)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "accessToken" | "access_token" | "access-token" => Ok(Self::AccessToken),
            "userId" | "user_id" | "user-id" => Ok(Self::UserId),
            "providerId" | "provider_id" | "provider-id" => Ok(Self::ProviderId),
            "cookie" => Ok(Self::Cookie),
            _ => Err(format!(
                "Unknown session slot: {value} (expected accessToken, userId, providerId or cookie)"
            )),
        }
    }
}

/// Persisted identifiers of the signed-in actor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl Session {
    pub fn get(&self, key: SessionKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    pub fn set(&mut self, key: SessionKey, value: &str) {
        *self.slot_mut(key) = Some(value.to_string());
    }

    pub fn remove(&mut self, key: SessionKey) -> Option<String> {
        self.slot_mut(key).take()
    }

    pub fn is_empty(&self) -> bool {
        SessionKey::all().iter().all(|key| self.slot(*key).is_none())
    }

    fn slot(&self, key: SessionKey) -> &Option<String> {
        match key {
            SessionKey::AccessToken => &self.access_token,
            SessionKey::UserId => &self.user_id,
            SessionKey::ProviderId => &self.provider_id,
            SessionKey::Cookie => &self.cookie,
        }
    }

    fn slot_mut(&mut self, key: SessionKey) -> &mut Option<String> {
        match key {
            SessionKey::AccessToken => &mut self.access_token,
            SessionKey::UserId => &mut self.user_id,
            SessionKey::ProviderId => &mut self.provider_id,
            SessionKey::Cookie => &mut self.cookie,
        }
    }
}

/// Key/value access to the current session.
///
/// Implementations use interior mutability so one store can be shared
/// between the request client and any number of workflows.
pub trait SessionStore: Send + Sync {
    /// Returns the stored value, or `None`. Never fails.
    fn get(&self, key: SessionKey) -> Option<String>;

    /// Stores a value, overwriting any previous one.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: SessionKey, value: &str) -> Result<()>;

    /// Removes one slot. Returns whether a value was present.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn clear(&self, key: SessionKey) -> Result<bool>;

    /// Removes every slot.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn clear_all(&self) -> Result<()>;

    /// Returns a copy of the whole session.
    fn snapshot(&self) -> Session;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process session store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.session).get(key).map(str::to_string)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        lock(&self.session).set(key, value);
        Ok(())
    }

    fn clear(&self, key: SessionKey) -> Result<bool> {
        Ok(lock(&self.session).remove(key).is_some())
    }

    fn clear_all(&self) -> Result<()> {
        *lock(&self.session) = Session::default();
        Ok(())
    }

    fn snapshot(&self) -> Session {
        lock(&self.session).clone()
    }
}

/// Session store backed by a JSON file.
///
/// The file is read on first access and rewritten on every mutation.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: Mutex<Option<Session>>,
}

impl FileSessionStore {
    /// Opens the store at the default location (`$HANDY_HOME/session.json`).
    pub fn open_default() -> Self {
        Self::open(paths::session_path())
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = lock(&self.cached);
        let session = guard.get_or_insert_with(|| match load_session(&self.path) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable session file: {err:#}");
                Session::default()
            }
        });
        f(session)
    }

    /// Applies `f` to a copy and keeps it only once the file is written.
    fn mutate<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        self.with_session(|session| {
            let mut next = session.clone();
            let out = f(&mut next);
            save_session(&self.path, &next)?;
            *session = next;
            Ok(out)
        })
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.with_session(|session| session.get(key).map(str::to_string))
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        self.mutate(|session| session.set(key, value))?;
        if key.is_secret() {
            tracing::info!(slot = %key, value = %mask_token(value), "session updated");
        } else {
            tracing::info!(slot = %key, value, "session updated");
        }
        Ok(())
    }

    fn clear(&self, key: SessionKey) -> Result<bool> {
        let removed = self.mutate(|session| session.remove(key).is_some())?;
        tracing::info!(slot = %key, removed, "session slot cleared");
        Ok(removed)
    }

    fn clear_all(&self) -> Result<()> {
        self.mutate(|session| *session = Session::default())?;
        tracing::info!("session cleared");
        Ok(())
    }

    fn snapshot(&self) -> Session {
        self.with_session(|session| session.clone())
    }
}

/// Loads a session file. Returns an empty session if the file doesn't exist.
fn load_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        return Ok(Session::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session from {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Session::default());
    }

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse session from {}", path.display()))
}

/// Saves the session with restricted permissions (0600).
fn save_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(session).context("Failed to serialize session")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    }

    Ok(())
}

/// Masks a credential for display, keeping only a short prefix.
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_memory_store_set_get_clear() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(SessionKey::AccessToken), None);

        store.set(SessionKey::AccessToken, "tok-1").unwrap();
        store.set(SessionKey::AccessToken, "tok-2").unwrap();
        store.set(SessionKey::ProviderId, "p1").unwrap();
        assert_eq!(store.get(SessionKey::AccessToken).as_deref(), Some("tok-2"));

        assert!(store.clear(SessionKey::AccessToken).unwrap());
        assert!(!store.clear(SessionKey::AccessToken).unwrap());
        assert_eq!(store.get(SessionKey::ProviderId).as_deref(), Some("p1"));

        store.clear_all().unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path);
        store.set(SessionKey::AccessToken, "access-token").unwrap();
        store.set(SessionKey::ProviderId, "p-42").unwrap();

        let reopened = FileSessionStore::open(&path);
        assert_eq!(
            reopened.get(SessionKey::AccessToken).as_deref(),
            Some("access-token")
        );
        assert_eq!(reopened.get(SessionKey::ProviderId).as_deref(), Some("p-42"));
        assert_eq!(reopened.get(SessionKey::UserId), None);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"accessToken\""));
        assert!(contents.contains("\"providerId\""));
    }

    #[test]
    fn test_file_store_is_lazy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileSessionStore::open(&path);
        assert_eq!(store.get(SessionKey::UserId), None);
        assert!(!path.exists(), "reads never create the file");

        store.set(SessionKey::UserId, "u1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_get_never_fails_on_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileSessionStore::open(&path);
        assert_eq!(store.get(SessionKey::AccessToken), None);

        store.set(SessionKey::UserId, "u1").unwrap();
        let reopened = FileSessionStore::open(&path);
        assert_eq!(reopened.get(SessionKey::UserId).as_deref(), Some("u1"));
    }

    #[test]
    fn test_file_store_clear_all_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path);
        store.set(SessionKey::AccessToken, "secret").unwrap();
        store.clear_all().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("secret"));
        assert!(FileSessionStore::open(&path).snapshot().is_empty());
    }

    #[test]
    fn test_file_store_failed_write_leaves_session_unchanged() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();

        let store = FileSessionStore::open(blocker.join("session.json"));
        assert!(store.set(SessionKey::AccessToken, "tok").is_err());
        assert_eq!(store.get(SessionKey::AccessToken), None);
        assert!(store.clear_all().is_err());
        assert!(store.snapshot().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        FileSessionStore::open(&path)
            .set(SessionKey::AccessToken, "secret")
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_session_key_parsing() {
        assert_eq!(
            "accessToken".parse::<SessionKey>(),
            Ok(SessionKey::AccessToken)
        );
        assert_eq!("provider_id".parse::<SessionKey>(), Ok(SessionKey::ProviderId));
        assert!("token".parse::<SessionKey>().is_err());
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiIsInR5cCI"), "eyJhbGciOiJI...");
        assert_eq!(mask_token("short"), "***");
    }
}
