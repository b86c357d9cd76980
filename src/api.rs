//! API client for the OpenList (AList-compatible) file-listing service.
//!
//! Every endpoint answers with the same JSON envelope,
//! `{ "code": 200, "message": "success", "data": ... }`. Anything but code
//! 200 is turned into an [`AppError`]: 401 becomes [`AppError::Auth`], missing
//! paths become [`AppError::NotFound`], the rest [`AppError::Api`].

use crate::error::{AppError, Result};
use crate::plan::RenamePlan;
use crate::types::FileEntry;
use log::debug;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for ordinary requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for batch renames, which can touch many files.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("episode-renamer/", env!("CARGO_PKG_VERSION"));

/// Account details reported by `/api/me`.
///
/// Servers disagree on which name field they fill in, so all are optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UserInfo {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserInfo {
    /// The first name field the server filled in.
    pub fn display_name(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.nick.as_deref())
            .or(self.name.as_deref())
    }
}

/// Operations the renamer needs from the remote service.
///
/// [`OpenListClient`] is the HTTP implementation; the session layer is
/// generic over this trait so it can run against other backends.
#[allow(async_fn_in_trait)]
pub trait RemoteFs {
    /// Exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<String>;

    /// Who the token belongs to.
    async fn current_user(&self, token: &str) -> Result<UserInfo>;

    /// List the entries of a directory.
    async fn list(&self, path: &str, token: &str) -> Result<Vec<FileEntry>>;

    /// Apply a whole plan inside `dir` in one request.
    async fn batch_rename(&self, dir: &str, plan: &RenamePlan, token: &str) -> Result<()>;

    /// Rename a single file or directory given by its full path.
    async fn rename(&self, path: &str, new_name: &str, token: &str) -> Result<()>;
}

// Envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

// Response types for login
#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

// Response types for directory listing
#[derive(Debug, Deserialize)]
struct ListData {
    // null for empty directories
    #[serde(default)]
    content: Option<Vec<FileEntry>>,
}

// Request types
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    path: &'a str,
    page: u32,
    per_page: u32,
    refresh: bool,
}

#[derive(Debug, Serialize)]
struct RenameObject<'a> {
    src_name: &'a str,
    new_name: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchRenameRequest<'a> {
    src_dir: &'a str,
    rename_objects: Vec<RenameObject<'a>>,
}

impl<'a> BatchRenameRequest<'a> {
    // The server applies the objects one by one, so they go out in step order.
    fn new(src_dir: &'a str, plan: &'a RenamePlan) -> Self {
        Self {
            src_dir,
            rename_objects: plan
                .steps()
                .iter()
                .map(|e| RenameObject {
                    src_name: &e.from,
                    new_name: &e.to,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    path: &'a str,
    name: &'a str,
}

/// Turn an envelope into its payload or the matching error.
fn unwrap_envelope<T>(envelope: Envelope<T>, context: &str) -> Result<Option<T>> {
    match envelope.code {
        200 => Ok(envelope.data),
        401 => Err(AppError::Auth(envelope.message)),
        404 => Err(AppError::NotFound(format!("{}: {}", context, envelope.message))),
        _ if envelope.message.to_lowercase().contains("not found") => {
            Err(AppError::NotFound(format!("{}: {}", context, envelope.message)))
        }
        code => Err(AppError::Api {
            code,
            message: envelope.message,
        }),
    }
}

/// HTTP client for one OpenList server.
#[derive(Debug, Clone)]
pub struct OpenListClient {
    base_url: String,
    client: reqwest::Client,
    batch_timeout: Duration,
}

impl OpenListClient {
    /// Create a client for `base_url` (e.g. `http://192.168.1.1:5244`).
    pub fn new(base_url: &str, request_timeout: Duration, batch_timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::InvalidInput(format!(
                "server address must start with http:// or https:// (got '{}')",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.to_string(),
            client,
            batch_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a prepared request and decode the envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Option<T>> {
        let resp = request.send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth(format!("{}: token rejected", context)));
        }

        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("{}: {}", context, e)))?;

        unwrap_envelope(envelope, context)
    }
}

impl RemoteFs for OpenListClient {
    async fn login(&self, username: &str, password: &str) -> Result<String> {
        debug!("Logging in to {} as {}", self.base_url, username);

        let request = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { username, password });

        // An unreachable server counts as a failed login.
        let data: Option<LoginData> = self.send(request, "Login").await.map_err(|e| match e {
            AppError::Network(msg) => AppError::Auth(format!("server unreachable: {}", msg)),
            other => other,
        })?;
        data.map(|d| d.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Parse("Login: response carries no token".to_string()))
    }

    async fn current_user(&self, token: &str) -> Result<UserInfo> {
        let request = self
            .client
            .get(self.url("/api/me"))
            .header(AUTHORIZATION, token);

        let data: Option<UserInfo> = self.send(request, "Fetch current user").await?;
        Ok(data.unwrap_or_default())
    }

    async fn list(&self, path: &str, token: &str) -> Result<Vec<FileEntry>> {
        debug!("Listing {}", path);

        let request = self
            .client
            .post(self.url("/api/fs/list"))
            .header(AUTHORIZATION, token)
            .json(&ListRequest {
                path,
                page: 1,
                per_page: 0,
                refresh: false,
            });

        let data: Option<ListData> = self.send(request, &format!("List '{}'", path)).await?;
        let entries = data.and_then(|d| d.content).unwrap_or_default();

        debug!("Found {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    async fn batch_rename(&self, dir: &str, plan: &RenamePlan, token: &str) -> Result<()> {
        debug!("Batch renaming {} entries in {}", plan.len(), dir);

        let body = BatchRenameRequest::new(dir, plan);

        let request = self
            .client
            .post(self.url("/api/fs/batch_rename"))
            .header(AUTHORIZATION, token)
            .timeout(self.batch_timeout)
            .json(&body);

        let _: Option<serde_json::Value> = self.send(request, "Batch rename").await?;
        Ok(())
    }

    async fn rename(&self, path: &str, new_name: &str, token: &str) -> Result<()> {
        debug!("Renaming {} to {}", path, new_name);

        let request = self
            .client
            .post(self.url("/api/fs/rename"))
            .header(AUTHORIZATION, token)
            .json(&RenameRequest {
                path,
                name: new_name,
            });

        let _: Option<serde_json::Value> = self.send(request, "Rename").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RenameEntry;

    fn envelope<T: DeserializeOwned>(json: &str) -> Envelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_scheme() {
        let err = OpenListClient::new("192.168.1.1:5244", REQUEST_TIMEOUT, BATCH_TIMEOUT);
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = OpenListClient::new("http://nas.local:5244/", REQUEST_TIMEOUT, BATCH_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), "http://nas.local:5244");
        assert_eq!(client.url("/api/me"), "http://nas.local:5244/api/me");
    }

    #[test]
    fn test_login_envelope() {
        let env: Envelope<LoginData> =
            envelope(r#"{"code":200,"message":"success","data":{"token":"abc"}}"#);
        let data = unwrap_envelope(env, "Login").unwrap().unwrap();
        assert_eq!(data.token, "abc");
    }

    #[test]
    fn test_list_envelope_with_null_content() {
        let env: Envelope<ListData> = envelope(
            r#"{"code":200,"message":"success","data":{"content":null,"total":0,"readme":"","write":true,"provider":"Local"}}"#,
        );
        let data = unwrap_envelope(env, "List").unwrap().unwrap();
        assert!(data.content.is_none());
    }

    #[test]
    fn test_list_envelope_entries() {
        let env: Envelope<ListData> = envelope(
            r#"{"code":200,"message":"success","data":{"content":[
                {"name":"Season 1","size":0,"is_dir":true,"modified":"2024-05-01T10:00:00Z"},
                {"name":"Show.S01E01.mkv","size":1048576,"is_dir":false,"modified":"2024-05-01T10:00:00Z"}
            ],"total":2}}"#,
        );
        let entries = unwrap_envelope(env, "List").unwrap().unwrap().content.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].size, 1048576);
    }

    #[test]
    fn test_unauthorized_envelope() {
        let env: Envelope<serde_json::Value> =
            envelope(r#"{"code":401,"message":"token is expired","data":null}"#);
        assert!(matches!(unwrap_envelope(env, "List"), Err(AppError::Auth(_))));
    }

    #[test]
    fn test_not_found_envelope() {
        let env: Envelope<serde_json::Value> =
            envelope(r#"{"code":500,"message":"failed get objs: object not found","data":null}"#);
        assert!(matches!(unwrap_envelope(env, "List"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_other_error_envelope() {
        let env: Envelope<serde_json::Value> =
            envelope(r#"{"code":403,"message":"permission denied","data":null}"#);
        match unwrap_envelope(env, "Rename") {
            Err(AppError::Api { code, message }) => {
                assert_eq!(code, 403);
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_user_info_display_name_order() {
        let info: UserInfo = serde_json::from_str(r#"{"id":1,"username":"admin","role":2}"#).unwrap();
        assert_eq!(info.display_name(), Some("admin"));

        let info = UserInfo {
            username: None,
            nick: Some("nick".to_string()),
            name: Some("name".to_string()),
        };
        assert_eq!(info.display_name(), Some("nick"));
        assert_eq!(UserInfo::default().display_name(), None);
    }

    #[test]
    fn test_batch_rename_body_shape() {
        let listing = vec![crate::types::FileEntry::file("a.mkv")];
        let plan = RenamePlan::validate(vec![RenameEntry::new("a.mkv", "b.mkv")], &listing).unwrap();
        let json = serde_json::to_value(BatchRenameRequest::new("/tv", &plan)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "src_dir": "/tv",
                "rename_objects": [{"src_name": "a.mkv", "new_name": "b.mkv"}]
            })
        );
    }

    #[test]
    fn test_batch_rename_body_moves_targets_out_first() {
        let listing = vec![
            crate::types::FileEntry::file("E01.mkv"),
            crate::types::FileEntry::file("E02.mkv"),
        ];
        let plan = RenamePlan::validate(
            vec![
                RenameEntry::new("E01.mkv", "E02.mkv"),
                RenameEntry::new("E02.mkv", "E03.mkv"),
            ],
            &listing,
        )
        .unwrap();
        let json = serde_json::to_value(BatchRenameRequest::new("/tv", &plan)).unwrap();
        assert_eq!(
            json["rename_objects"],
            serde_json::json!([
                {"src_name": "E02.mkv", "new_name": "E03.mkv"},
                {"src_name": "E01.mkv", "new_name": "E02.mkv"}
            ])
        );
    }

    #[tokio::test]
    async fn test_login_unreachable_server_is_auth_error() {
        // Nothing listens on the discard port.
        let client = OpenListClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .unwrap();
        match client.login("admin", "pw").await {
            Err(AppError::Auth(msg)) => assert!(msg.contains("unreachable")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }
}
