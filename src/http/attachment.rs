// 附件源接口

use crate::http::HttpError;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// 附件源
///
/// 把不透明的附件引用解析为可读字节流，展示文件名由调用方
/// 从引用的最后一段路径推导
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    async fn open(&self, reference: &str)
        -> Result<Box<dyn AsyncRead + Send + Unpin>, HttpError>;
}

/// 以本地文件路径作为附件引用的实现
pub struct FileAttachmentSource;

#[async_trait]
impl AttachmentSource for FileAttachmentSource {
    async fn open(
        &self,
        reference: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, HttpError> {
        let file = tokio::fs::File::open(reference).await?;
        Ok(Box::new(file))
    }
}
