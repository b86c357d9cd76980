//! Authenticated access to the remote service.
//!
//! A [`Session`] owns the bearer token. On startup it tries the token left in
//! the [`TokenCache`] by a previous run; after every successful login it
//! writes the new token back. When the server rejects the token in the middle
//! of an operation the session logs in again once and repeats the request;
//! a second rejection is final.

use crate::api::RemoteFs;
use crate::error::{AppError, Result};
use crate::plan::RenamePlan;
use crate::types::FileEntry;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_FILE: &str = "token.json";

/// A token as stored on disk, tagged with its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedToken {
    pub username: String,
    pub token: String,
    /// Unix timestamp of the login that produced the token.
    pub saved_at: u64,
}

/// The token file inside the state directory.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(TOKEN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing or unreadable file is treated as no
    /// token.
    pub fn load(&self) -> Option<CachedToken> {
        if !self.path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!("Ignoring malformed token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write a token for `username`, creating the state directory if needed.
    pub fn save(&self, username: &str, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let cached = CachedToken {
            username: username.to_string(),
            token: token.to_string(),
            saved_at,
        };
        write_private(&self.path, &serde_json::to_string_pretty(&cached)?)?;
        debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the token file if present.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Write `content` readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies to newly created files
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)
}

/// A logged-in (or logging-in) connection to the remote service.
pub struct Session<R: RemoteFs> {
    remote: R,
    username: String,
    password: Option<String>,
    token: Option<String>,
    cache: TokenCache,
}

impl<R: RemoteFs> Session<R> {
    pub fn new(remote: R, username: &str, cache: TokenCache) -> Self {
        Self {
            remote,
            username: username.to_string(),
            password: None,
            token: None,
            cache,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Try the cached token. Returns true when it belongs to this user and
    /// the server still accepts it.
    pub async fn resume(&mut self) -> bool {
        let Some(cached) = self.cache.load() else {
            debug!("No cached token at {}", self.cache.path().display());
            return false;
        };

        if cached.username != self.username {
            info!(
                "Cached token belongs to '{}', not '{}'",
                cached.username, self.username
            );
            return false;
        }

        let valid = match self.remote.current_user(&cached.token).await {
            Ok(user) => match user.display_name() {
                Some(name) if name != self.username => {
                    info!("Server reports token owner '{}'", name);
                    false
                }
                _ => true,
            },
            Err(AppError::Auth(msg)) => {
                info!("Cached token rejected: {}", msg);
                false
            }
            Err(e) => {
                // Older servers lack /api/me; fall back to listing the root.
                debug!("User lookup failed ({}), probing with a listing", e);
                self.remote.list("/", &cached.token).await.is_ok()
            }
        };

        if valid {
            self.token = Some(cached.token);
        }
        valid
    }

    /// Log in with `password` and cache the new token.
    ///
    /// The password is kept for the single re-login after a rejected token.
    pub async fn login(&mut self, password: &str) -> Result<()> {
        let token = self.remote.login(&self.username, password).await?;
        info!("Logged in as {}", self.username);

        if let Err(e) = self.cache.save(&self.username, &token) {
            warn!("Could not save token: {}", e);
        }
        self.token = Some(token);
        self.password = Some(password.to_string());
        Ok(())
    }

    async fn relogin(&mut self) -> Result<String> {
        self.token = None;
        let password = self.password.clone().ok_or_else(|| {
            AppError::Auth("session expired and no password is available".to_string())
        })?;
        warn!("Token rejected, logging in again");
        self.login(&password).await?;
        self.current_token()
    }

    fn current_token(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| AppError::Auth("not logged in".to_string()))
    }

    /// List a directory, re-logging in once if the token was rejected.
    pub async fn list(&mut self, path: &str) -> Result<Vec<FileEntry>> {
        let token = self.current_token()?;
        match self.remote.list(path, &token).await {
            Err(AppError::Auth(_)) => {
                let token = self.relogin().await?;
                self.remote.list(path, &token).await
            }
            other => other,
        }
    }

    /// Send a validated plan for `dir` as one batch request.
    ///
    /// Empty plans are not sent. A rejected token gets the same single
    /// re-login as listing; since the server refused the request nothing was
    /// renamed, so repeating it is safe.
    pub async fn execute_plan(&mut self, dir: &str, plan: &RenamePlan) -> Result<()> {
        if plan.is_empty() {
            debug!("Nothing to rename in {}", dir);
            return Ok(());
        }

        let token = self.current_token()?;
        let result = match self.remote.batch_rename(dir, plan, &token).await {
            Err(AppError::Auth(_)) => {
                let token = self.relogin().await?;
                self.remote.batch_rename(dir, plan, &token).await
            }
            other => other,
        };

        if result.is_ok() {
            info!("Renamed {} entries in {}", plan.len(), dir);
        }
        result
    }

    /// Rename one file or directory by full path.
    pub async fn rename_item(&mut self, path: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::InvalidInput("new name is empty".to_string()));
        }
        if path.rsplit('/').next() == Some(new_name) {
            return Err(AppError::InvalidInput("new name equals the current name".to_string()));
        }

        let token = self.current_token()?;
        match self.remote.rename(path, new_name, &token).await {
            Err(AppError::Auth(_)) => {
                let token = self.relogin().await?;
                self.remote.rename(path, new_name, &token).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UserInfo;
    use crate::plan::RenameEntry;
    use std::cell::{Cell, RefCell};

    /// In-memory remote. Tokens issued by `login` are "token-N"; tokens in
    /// `expired` are rejected with an auth error.
    #[derive(Default)]
    struct FakeRemote {
        password: String,
        logins: Cell<u32>,
        expired: RefCell<Vec<String>>,
        me_unsupported: bool,
        owner: Option<String>,
        renames: RefCell<Vec<(String, usize)>>,
    }

    impl FakeRemote {
        fn new(password: &str) -> Self {
            Self {
                password: password.to_string(),
                ..Default::default()
            }
        }

        fn check(&self, token: &str) -> Result<()> {
            if self.expired.borrow().iter().any(|t| t == token) {
                Err(AppError::Auth("token is expired".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl RemoteFs for FakeRemote {
        async fn login(&self, _username: &str, password: &str) -> Result<String> {
            if password != self.password {
                return Err(AppError::Auth("password is incorrect".to_string()));
            }
            self.logins.set(self.logins.get() + 1);
            Ok(format!("token-{}", self.logins.get()))
        }

        async fn current_user(&self, token: &str) -> Result<UserInfo> {
            if self.me_unsupported {
                return Err(AppError::Network("404 page not found".to_string()));
            }
            self.check(token)?;
            Ok(UserInfo {
                username: self.owner.clone(),
                ..Default::default()
            })
        }

        async fn list(&self, _path: &str, token: &str) -> Result<Vec<FileEntry>> {
            self.check(token)?;
            Ok(vec![FileEntry::file("a.mkv")])
        }

        async fn batch_rename(&self, dir: &str, plan: &RenamePlan, token: &str) -> Result<()> {
            self.check(token)?;
            self.renames.borrow_mut().push((dir.to_string(), plan.len()));
            Ok(())
        }

        async fn rename(&self, path: &str, _new_name: &str, token: &str) -> Result<()> {
            self.check(token)?;
            self.renames.borrow_mut().push((path.to_string(), 1));
            Ok(())
        }
    }

    fn plan() -> RenamePlan {
        RenamePlan::validate(
            vec![RenameEntry::new("a.mkv", "b.mkv")],
            &[FileEntry::file("a.mkv")],
        )
        .unwrap()
    }

    #[test]
    fn test_token_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(&dir.path().join("state"));
        assert!(cache.load().is_none());

        cache.save("admin", "secret").unwrap();
        let cached = cache.load().unwrap();
        assert_eq!(cached.username, "admin");
        assert_eq!(cached.token, "secret");

        cache.clear().unwrap();
        assert!(cache.load().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        fs::write(cache.path(), "{}").unwrap();
        fs::set_permissions(cache.path(), fs::Permissions::from_mode(0o644)).unwrap();

        cache.save("admin", "secret").unwrap();
        let mode = fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(cache.load().unwrap().token, "secret");
    }

    #[test]
    fn test_token_cache_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        fs::write(cache.path(), "not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[tokio::test]
    async fn test_login_saves_token() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        let mut session = Session::new(FakeRemote::new("pw"), "admin", cache.clone());

        session.login("pw").await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(cache.load().unwrap().token, "token-1");
    }

    #[tokio::test]
    async fn test_login_bad_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        assert!(matches!(session.login("nope").await, Err(AppError::Auth(_))));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_resume_accepts_matching_cached_token() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let remote = FakeRemote {
            owner: Some("admin".to_string()),
            ..FakeRemote::new("pw")
        };
        let mut session = Session::new(remote, "admin", cache);
        assert!(session.resume().await);
        assert!(session.list("/").await.is_ok());
    }

    #[tokio::test]
    async fn test_resume_rejects_other_user() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let mut session = Session::new(FakeRemote::new("pw"), "guest", cache);
        assert!(!session.resume().await);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_resume_rejects_server_reported_owner_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let remote = FakeRemote {
            owner: Some("someone-else".to_string()),
            ..FakeRemote::new("pw")
        };
        let mut session = Session::new(remote, "admin", cache);
        assert!(!session.resume().await);
    }

    #[tokio::test]
    async fn test_resume_rejects_expired_token() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let remote = FakeRemote::new("pw");
        remote.expired.borrow_mut().push("old".to_string());
        let mut session = Session::new(remote, "admin", cache);
        assert!(!session.resume().await);
    }

    #[tokio::test]
    async fn test_resume_falls_back_to_listing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let remote = FakeRemote {
            me_unsupported: true,
            ..FakeRemote::new("pw")
        };
        let mut session = Session::new(remote, "admin", cache);
        assert!(session.resume().await);
    }

    #[tokio::test]
    async fn test_list_relogs_in_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        session.login("pw").await.unwrap();
        session.remote.expired.borrow_mut().push("token-1".to_string());

        let entries = session.list("/tv").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(session.remote.logins.get(), 2);
    }

    #[tokio::test]
    async fn test_list_fails_after_second_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        session.login("pw").await.unwrap();
        session
            .remote
            .expired
            .borrow_mut()
            .extend(["token-1".to_string(), "token-2".to_string()]);

        assert!(matches!(session.list("/tv").await, Err(AppError::Auth(_))));
        assert_eq!(session.remote.logins.get(), 2);
    }

    #[tokio::test]
    async fn test_resumed_session_cannot_relogin_without_password() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        cache.save("admin", "old").unwrap();

        let mut session = Session::new(FakeRemote::new("pw"), "admin", cache);
        assert!(session.resume().await);
        session.remote.expired.borrow_mut().push("old".to_string());

        assert!(matches!(session.list("/").await, Err(AppError::Auth(_))));
        assert_eq!(session.remote.logins.get(), 0);
    }

    #[tokio::test]
    async fn test_execute_plan_sends_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        session.login("pw").await.unwrap();

        session.execute_plan("/tv", &plan()).await.unwrap();
        assert_eq!(*session.remote.renames.borrow(), vec![("/tv".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_execute_empty_plan_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        session.login("pw").await.unwrap();

        session.execute_plan("/tv", &RenamePlan::default()).await.unwrap();
        assert!(session.remote.renames.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_execute_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        assert!(matches!(
            session.execute_plan("/tv", &plan()).await,
            Err(AppError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_item_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(FakeRemote::new("pw"), "admin", TokenCache::new(dir.path()));
        session.login("pw").await.unwrap();

        assert!(matches!(
            session.rename_item("/tv/a.mkv", "  ").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            session.rename_item("/tv/a.mkv", "a.mkv").await,
            Err(AppError::InvalidInput(_))
        ));
        session.rename_item("/tv/a.mkv", "b.mkv").await.unwrap();
        assert_eq!(session.remote.renames.borrow().len(), 1);
    }
}
