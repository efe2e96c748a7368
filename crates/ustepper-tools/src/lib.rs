//! # uStepper Tools - 录制序列与 HTTP 侧通道
//!
//! **依赖原则**: 只依赖 `ustepper-protocol`，不依赖驱动层
//!
//! ## 包含模块
//!
//! - `recording` - 录制序列（`recording.txt` 的逐行文本）
//! - `remote` - 控制器的 HTTP 接口（`GET /recording.txt`、`POST /upload`）

pub mod recording;
pub mod remote;

pub use recording::{RecordingError, RecordingSequence};
pub use remote::{
    MAX_UPLOAD_SIZE, RECORDING_FILE_NAME, RecordingClient, UploadError, UploadPolicy,
    http_base_from_endpoint,
};
