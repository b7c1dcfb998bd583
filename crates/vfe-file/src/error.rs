//! 导出错误定义

use thiserror::Error;

/// 导出失败
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("IO failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// 用户在导出过程中取消
    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn render(msg: impl Into<String>) -> Self {
        ExportError::RenderFailed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }
}

/// 导出设置读写错误
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No configuration directory available")]
    NoConfigDir,
}
