//! # 控制器 HTTP 侧通道
//!
//! 控制器在 80 端口提供两个 HTTP 接口：
//! - `GET /recording.txt`：读取当前录制；
//! - `POST /upload`：上传录制文件（multipart，字段 `file`，文件名固定为 `recording.txt`）。
//!
//! 上传前在本地检查大小和类型，控制器不会返回有意义的错误信息。

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::{Client, multipart};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::recording::RecordingSequence;

/// 上传大小上限（2 MiB）
pub const MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024;

/// 控制器上的录制文件名
pub const RECORDING_FILE_NAME: &str = "recording.txt";

const UPLOAD_PATH: &str = "upload";
const UPLOAD_FIELD: &str = "file";
const TEXT_PLAIN: &str = "text/plain";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File: Incorrect type ({mime})")]
    UnsupportedType { mime: String },

    #[error("File: Exceeded size 2MB ({size} > {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

/// 上传检查规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_size: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size: MAX_UPLOAD_SIZE,
            allowed_types: vec![TEXT_PLAIN.to_string()],
        }
    }
}

impl UploadPolicy {
    /// 先检查类型，再检查大小
    pub fn validate(&self, size: u64, mime: &str) -> Result<(), UploadError> {
        if !self.allowed_types.iter().any(|t| t == mime) {
            return Err(UploadError::UnsupportedType {
                mime: mime.to_string(),
            });
        }
        if size > self.max_size {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// 按扩展名推断 MIME 类型（浏览器的做法）
    pub fn guess_mime(path: &Path) -> &'static str {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => TEXT_PLAIN,
            _ => "application/octet-stream",
        }
    }
}

/// 从 WebSocket 地址推导 HTTP 根地址
///
/// `ws://192.168.4.1:81/` → `http://192.168.4.1/`（HTTP 服务固定在默认端口）
pub fn http_base_from_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).with_context(|| format!("invalid endpoint {}", endpoint))?;
    let host = url
        .host_str()
        .with_context(|| format!("endpoint {} has no host", endpoint))?;
    Url::parse(&format!("http://{}/", host)).context("failed to build HTTP base URL")
}

/// 录制文件 HTTP 客户端（阻塞）
#[derive(Debug, Clone)]
pub struct RecordingClient {
    base: Url,
    http: Client,
    policy: UploadPolicy,
}

impl RecordingClient {
    /// `base_url` 为控制器的 HTTP 根地址，例如 `http://192.168.4.1/`
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid base URL {}", base_url))?;
        // join 以目录为基准
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base,
            http,
            policy: UploadPolicy::default(),
        })
    }

    /// 由 WebSocket 地址创建
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(http_base_from_endpoint(endpoint)?.as_str())
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// 读取控制器上的录制
    pub fn fetch(&self) -> Result<RecordingSequence> {
        let url = self.base.join(RECORDING_FILE_NAME)?;
        debug!(%url, "Fetching recording");

        let text = self
            .http
            .get(url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .with_context(|| format!("GET {} failed", url))?;

        let sequence = RecordingSequence::parse(&text);
        info!(lines = sequence.len(), "Recording fetched");
        Ok(sequence)
    }

    /// 上传本地文件
    ///
    /// 类型按扩展名判断，不符合规则时返回 [`UploadError`]（可通过 `downcast_ref` 取出）。
    pub fn upload(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        self.policy.validate(size, UploadPolicy::guess_mime(path))?;

        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.post(data)
    }

    /// 上传内存中的录制序列
    pub fn upload_sequence(&self, sequence: &RecordingSequence) -> Result<()> {
        let data = sequence.to_text().into_bytes();
        self.policy.validate(data.len() as u64, TEXT_PLAIN)?;
        self.post(data)
    }

    fn post(&self, data: Vec<u8>) -> Result<()> {
        let url = self.base.join(UPLOAD_PATH)?;
        let size = data.len();

        let part = multipart::Part::bytes(data)
            .file_name(RECORDING_FILE_NAME)
            .mime_str(TEXT_PLAIN)?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        self.http
            .post(url.clone())
            .multipart(form)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("POST {} failed", url))?;

        info!(bytes = size, "Recording uploaded");
        Ok(())
    }
}
