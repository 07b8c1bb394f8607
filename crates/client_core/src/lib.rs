use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::AlarmId,
    error::{ApiErrorBody, ErrorCode},
    protocol::{
        Ack, Alarm, AlarmPayload, AudioTestResult, ConfigBundle, CreatedAlarm, DeviceStatus,
        FileEntry, FsUsage,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod forms;

/// Header carrying the opaque admin token. The token is never inspected or
/// derived locally; it is stored console-side and echoed to the device.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Upload cap enforced console-side before any bytes leave the machine,
/// matching the device's own limit.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid device url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx response; the device's message is carried verbatim.
    #[error("device returned {status}: {body}")]
    Api { status: StatusCode, body: ApiErrorBody },
    #[error("file is {size} bytes, upload limit is {MAX_UPLOAD_BYTES}")]
    FileTooLarge { size: usize },
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { body, .. } => Some(body.code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Ephemeral view cache, refreshed from each list response. Holds exactly
/// the records the device returned, in response order.
#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    pub alarms: Vec<Alarm>,
    pub files: Vec<FileEntry>,
}

impl ConsoleState {
    pub fn alarm(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id)
    }
}

/// Typed client for the alarm device's JSON REST API. One method per
/// endpoint, single best-effort request per call, no retries.
#[derive(Debug)]
pub struct DeviceClient {
    http: Client,
    base_url: String,
    admin_token: Option<String>,
    pub state: ConsoleState,
}

impl DeviceClient {
    pub fn new(base_url: impl AsRef<str>, admin_token: Option<String>) -> Result<Self> {
        let raw = base_url.as_ref();
        let parsed = Url::parse(raw).map_err(|source| ClientError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            admin_token: admin_token.filter(|t| !t.is_empty()),
            state: ConsoleState::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_admin_token(&mut self, token: Option<String>) {
        self.admin_token = token.filter(|t| !t.is_empty());
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.admin_token {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }
        builder
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(%path, %status, "device response");
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiErrorBody>(&text).unwrap_or_else(|_| {
            ApiErrorBody::new(if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            })
        });
        warn!(%path, %status, error = %body, "device request failed");
        Err(ClientError::Api { status, body })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path, self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self.request(Method::POST, path).json(body);
        let response = self.send(path, builder).await?;
        Ok(response.json().await?)
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path, self.request(Method::POST, path)).await?;
        Ok(response.json().await?)
    }

    // --- status ---

    pub async fn status(&self) -> Result<DeviceStatus> {
        self.get_json("/api/status").await
    }

    // --- alarms ---

    /// Fetches the alarm list and refreshes the cache with exactly the
    /// returned records.
    pub async fn alarms(&mut self) -> Result<&[Alarm]> {
        let alarms: Vec<Alarm> = self.get_json("/api/alarms").await?;
        self.state.alarms = alarms;
        Ok(&self.state.alarms)
    }

    pub async fn alarm(&self, id: AlarmId) -> Result<Alarm> {
        self.get_json(&format!("/api/alarms/{id}")).await
    }

    pub async fn create_alarm(&self, payload: &AlarmPayload) -> Result<AlarmId> {
        let created: CreatedAlarm = self.post_json("/api/alarms", payload).await?;
        Ok(created.id)
    }

    pub async fn update_alarm(&self, id: AlarmId, payload: &AlarmPayload) -> Result<Ack> {
        let path = format!("/api/alarms/{id}");
        let builder = self.request(Method::PUT, &path).json(payload);
        let response = self.send(&path, builder).await?;
        Ok(response.json().await?)
    }

    pub async fn delete_alarm(&mut self, id: AlarmId) -> Result<Ack> {
        let path = format!("/api/alarms/{id}");
        let response = self.send(&path, self.request(Method::DELETE, &path)).await?;
        self.state.alarms.retain(|a| a.id != id);
        Ok(response.json().await?)
    }

    pub async fn set_enabled(&self, id: AlarmId, enabled: bool) -> Result<Ack> {
        let action = if enabled { "enable" } else { "disable" };
        self.post_empty(&format!("/api/alarms/{id}/{action}")).await
    }

    /// Flips the enabled flag, resolving the current state from the cache
    /// first and falling back to a fetch. Returns the new state.
    pub async fn toggle_alarm(&mut self, id: AlarmId) -> Result<bool> {
        let enabled = match self.state.alarm(id) {
            Some(alarm) => alarm.enabled,
            None => self.alarm(id).await?.enabled,
        };
        self.set_enabled(id, !enabled).await?;
        Ok(!enabled)
    }

    pub async fn fire(&self, id: AlarmId) -> Result<Ack> {
        self.post_empty(&format!("/api/alarms/{id}/fire")).await
    }

    /// Snoozes the currently ringing alarm; the device answers 409
    /// `not_ringing` otherwise.
    pub async fn snooze(&self, id: AlarmId) -> Result<Ack> {
        self.post_empty(&format!("/api/alarms/{id}/snooze")).await
    }

    pub async fn dismiss(&self, id: AlarmId) -> Result<Ack> {
        self.post_empty(&format!("/api/alarms/{id}/dismiss")).await
    }

    /// The device answers 500 with a structured body when playback fails;
    /// that body is still the interesting result, so it is parsed either way.
    pub async fn test_audio(&self, id: AlarmId) -> Result<AudioTestResult> {
        let path = format!("/api/alarms/{id}/test_audio");
        let response = self.request(Method::POST, &path).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if let Ok(result) = serde_json::from_str::<AudioTestResult>(&text) {
            return Ok(result);
        }
        let body = serde_json::from_str::<ApiErrorBody>(&text)
            .unwrap_or_else(|_| ApiErrorBody::new(text));
        Err(ClientError::Api { status, body })
    }

    // --- files ---

    pub async fn files(&mut self) -> Result<&[FileEntry]> {
        let files: Vec<FileEntry> = self.get_json("/api/files").await?;
        self.state.files = files;
        Ok(&self.state.files)
    }

    pub async fn files_space(&self) -> Result<FsUsage> {
        self.get_json("/api/files/space").await
    }

    /// Multipart upload, field name `file`. Size is checked locally so an
    /// oversized file never starts a transfer the device will reject.
    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ClientError::FileTooLarge { size: bytes.len() });
        }
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let path = "/api/files/upload";
        let builder = self.request(Method::POST, path).multipart(form);
        self.send(path, builder).await?;
        Ok(())
    }

    pub async fn delete_file(&mut self, file_path: &str) -> Result<Ack> {
        let path = "/api/files";
        let builder = self
            .request(Method::DELETE, path)
            .query(&[("path", file_path)]);
        let response = self.send(path, builder).await?;
        self.state.files.retain(|f| f.path != file_path);
        Ok(response.json().await?)
    }

    // --- logs ---

    pub async fn logs(&self) -> Result<Vec<String>> {
        self.get_json("/api/logs").await
    }

    // --- config ---

    pub async fn export_config(&self) -> Result<ConfigBundle> {
        self.get_json("/api/config/export").await
    }

    pub async fn import_config(&self, bundle: &ConfigBundle) -> Result<Ack> {
        self.post_json("/api/config/import", bundle).await
    }

    // --- system ---

    pub async fn restart(&self) -> Result<Ack> {
        self.post_empty("/api/system/restart").await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
