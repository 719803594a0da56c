// HTTP 模块错误类型

use thiserror::Error;

/// HTTP 请求构建与传输错误
///
/// 配置类错误（InvalidArgument / LimitExceeded）由构建方法同步返回；
/// 传输类错误在 build 发送阶段产生
#[derive(Debug, Error)]
pub enum HttpError {
    /// 请求参数无效（无法解析的目标 URL 等）
    #[error("无效的请求参数: {0}")]
    InvalidArgument(String),
    /// 表单字段数量或大小超出限制
    #[error("超出限制: {0}")]
    LimitExceeded(String),
    /// 底层传输失败（连接、读写）
    #[error("传输失败: {0}")]
    Transport(String),
    /// 本地 I/O 失败（multipart 缓冲文件等）
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        HttpError::Transport(e.to_string())
    }
}
