// API client module: a small blocking HTTP client for the GPT-4 proxy API.
// Every call is a single request with its own timeout; nothing is retried
// and the first failure is returned to the caller.

use crate::model::{ChatRequest, ChatResponse, UploadResponse, UploadType};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://beta.gpt4api.plus";

pub const CHAT_PATH: &str = "/standard/all-tools";
pub const UPLOAD_PATH: &str = "/standard/uploaded";
pub const CHAT_UPLOAD_PATH: &str = "/standard/chat/uploaded";

/// Conversations can take minutes when tools run server side.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(8 * 60);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(8);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status: {code}, {reason}")]
    Status { code: u16, reason: String },

    #[error("invalid response json: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("upload response has no `{0}`")]
    MissingField(&'static str),

    #[error("access token is not a valid header value")]
    InvalidToken,
}

impl ApiError {
    fn from_status(status: StatusCode) -> Self {
        ApiError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Holds a reqwest blocking client, the base URL of the proxy and the
/// bearer token sent with every call.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Build a client for `base_url`. Timeouts are set per request, so the
    /// underlying client has none.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: Client, base_url: &str, token: &str) -> Self {
        ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = token.to_string();
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let val = format!("Bearer {}", self.token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&val).map_err(|_| ApiError::InvalidToken)?,
        );
        Ok(headers)
    }

    /// Send a chat message and parse the typed response.
    pub fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.post_chat(req)
    }

    /// Same call as [`ApiClient::chat`], keeping the response as raw JSON.
    pub fn chat_value(&self, req: &ChatRequest) -> Result<serde_json::Value> {
        self.post_chat(req)
    }

    fn post_chat<T: DeserializeOwned>(&self, req: &ChatRequest) -> Result<T> {
        let url = self.url(CHAT_PATH);
        info!(%url, model = %req.model, "sending chat request");
        debug!(payload = ?req, "chat payload");

        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let res = self
            .client
            .post(&url)
            .headers(headers)
            .timeout(CHAT_TIMEOUT)
            .json(req)
            .send()?;
        parse_ok(res)
    }

    /// Upload a file with multipart/form-data to `/standard/uploaded`.
    /// The file is checked before anything goes on the wire.
    pub fn upload(
        &self,
        file_path: &Path,
        conversation_id: &str,
        upload_type: UploadType,
    ) -> Result<UploadResponse> {
        let (file_name, bytes) = read_upload(file_path)?;
        let url = self.url(UPLOAD_PATH);
        info!(%url, file = %file_name, kind = upload_type.as_str(), "uploading file");

        let form = multipart::Form::new()
            .text("conversation_id", conversation_id.to_string())
            .text("type", upload_type.as_str())
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()?;
        parse_ok(res)
    }

    /// Upload through `/standard/chat/uploaded` and hand back the body as
    /// text. The status is not checked here, the caller sees whatever the
    /// server answered.
    pub fn upload_to_chat(&self, file_path: &Path) -> Result<String> {
        let (file_name, bytes) = read_upload(file_path)?;
        let url = self.url(CHAT_UPLOAD_PATH);
        let mime = mime_guess::from_path(file_path).first_or_octet_stream();
        info!(%url, file = %file_name, %mime, "uploading file to chat");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new()
            .text("type", UploadType::MyFiles.as_str())
            .text("conversation_id", "")
            .part("file", part);

        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()?;
        if res.status() != StatusCode::OK {
            warn!(status = %res.status(), "chat upload returned non-200");
        }
        Ok(res.text()?)
    }

    /// Upload a document, then ask about it. The `attachment` and `part`
    /// from the upload response go into the chat request as they are.
    pub fn upload_then_chat(&self, file_path: &Path, mut req: ChatRequest) -> Result<ChatResponse> {
        let uploaded = self.upload(file_path, "", UploadType::MyFiles)?;
        let attachment = uploaded.attachment.ok_or(ApiError::MissingField("attachment"))?;
        let part = uploaded.part.ok_or(ApiError::MissingField("part"))?;

        req.attachments = vec![attachment];
        req.parts = vec![part];
        self.chat(&req)
    }

    /// Fetch `url` into `dir/file_name`, returning the written path.
    pub fn download(&self, url: &str, dir: &Path, file_name: &str) -> Result<PathBuf> {
        info!(%url, "downloading file");
        let mut res = self.client.get(url).timeout(DOWNLOAD_TIMEOUT).send()?;
        if res.status() != StatusCode::OK {
            return Err(ApiError::from_status(res.status()));
        }

        let local = dir.join(file_name);
        let mut file = File::create(&local)?;
        let written = match res.copy_to(&mut file) {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&local);
                return Err(e.into());
            }
        };
        debug!(path = %local.display(), bytes = written, "download written");
        Ok(local)
    }
}

fn read_upload(file_path: &Path) -> Result<(String, Vec<u8>)> {
    if !file_path.exists() {
        return Err(ApiError::FileNotFound(file_path.to_path_buf()));
    }
    let bytes = std::fs::read(file_path)?;
    let file_name = file_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".into());
    Ok((file_name, bytes))
}

fn parse_ok<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status != StatusCode::OK {
        return Err(ApiError::from_status(status));
    }
    let body = res.text()?;
    Ok(serde_json::from_str(&body)?)
}
