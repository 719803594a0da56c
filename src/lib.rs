// Transfer Orchestrator Rust Library
// 异步传输编排核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// HTTP 请求构建模块
pub mod http;

// 传输服务边界模块
pub mod transfer;

// 下载进度监视模块
pub mod monitor;

// 导出常用类型
pub use config::{AppConfig, ConfigError, LogConfig, MonitorConfig};
pub use http::{
    AttachmentSource, Connection, ConnectionSpec, FileAttachmentSource, HttpError, MultipartBody,
    MultipartEncoder, RequestBody, RequestBuilder, ReqwestTransport, Transport, MAX_REDIRECTS,
};
pub use logging::{init_logging, LogGuard};
pub use monitor::{download, CallbackContext, DownloadProgressMonitor, PollingConfig, TransferListener};
pub use transfer::{TransferError, TransferHandle, TransferService, TransferStatus};
