//! multipart/form-data 流式编码
//!
//! 请求体写入临时缓冲文件而不是内存，任意大小的附件都不会撑爆内存。
//! 传输层发送前需要完整的 Content-Length，所以不走 chunked 编码，
//! 而是先落盘、再按文件大小声明长度、最后一次性流式写出。

use crate::http::HttpError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// 边界随机串长度
const BOUNDARY_LEN: usize = 30;

/// multipart 编码器
///
/// 字段按追加顺序写入缓冲文件；每个非末尾字段之后是分隔边界，
/// 末尾字段之后是结束边界
pub struct MultipartEncoder {
    /// 边界串，构造时随机生成
    boundary: String,
    /// 缓冲文件（RAII，最后一个持有者释放时删除）
    spool: NamedTempFile,
    /// 缓冲文件的异步写入句柄
    writer: File,
    first_boundary_written: bool,
    last_boundary_written: bool,
}

impl MultipartEncoder {
    /// 创建编码器并生成随机边界
    pub fn new() -> Result<Self, HttpError> {
        let spool = NamedTempFile::new()?;
        let writer = File::from_std(spool.reopen()?);
        Ok(Self {
            boundary: generate_boundary(),
            spool,
            writer,
            first_boundary_written: false,
            last_boundary_written: false,
        })
    }

    /// 边界串，Content-Type 头需要
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// 写入起始边界，幂等
    pub async fn write_first_boundary_if_needed(&mut self) -> Result<(), HttpError> {
        if self.first_boundary_written {
            return Ok(());
        }
        self.writer
            .write_all(format!("--{}\r\n", self.boundary).as_bytes())
            .await?;
        self.first_boundary_written = true;
        Ok(())
    }

    /// 写入结束边界，幂等
    pub async fn write_last_boundary_if_needed(&mut self) -> Result<(), HttpError> {
        if self.last_boundary_written {
            return Ok(());
        }
        self.writer
            .write_all(format!("\r\n--{}--\r\n", self.boundary).as_bytes())
            .await?;
        self.last_boundary_written = true;
        Ok(())
    }

    /// 追加文本字段，字段之后写入分隔边界
    pub async fn add_part(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        self.write_first_boundary_if_needed().await?;
        let header = format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name);
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(value.as_bytes()).await?;
        self.writer
            .write_all(format!("\r\n--{}\r\n", self.boundary).as_bytes())
            .await?;
        Ok(())
    }

    /// 追加文件字段，字节流原样拷贝进缓冲文件
    ///
    /// 结束边界必须在流重放之前确定，由 is_last 标记：
    /// true 时字段之后紧跟结束边界，否则写入分隔边界
    pub async fn add_file_part<R>(
        &mut self,
        name: &str,
        filename: &str,
        stream: &mut R,
        is_last: bool,
    ) -> Result<(), HttpError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.write_first_boundary_if_needed().await?;
        let header = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            name, filename
        );
        self.writer.write_all(header.as_bytes()).await?;
        tokio::io::copy(stream, &mut self.writer).await?;
        if is_last {
            self.write_last_boundary_if_needed().await?;
        } else {
            self.writer
                .write_all(format!("\r\n--{}\r\n", self.boundary).as_bytes())
                .await?;
        }
        Ok(())
    }

    /// 缓冲体总字节数，发送前据此设置 Content-Length
    pub async fn content_length(&mut self) -> Result<u64, HttpError> {
        self.writer.flush().await?;
        Ok(self.spool.as_file().metadata()?.len())
    }

    /// 将缓冲体一次性流式写出到目标，返回写出的字节数
    pub async fn write_to<W>(&mut self, dst: &mut W) -> Result<u64, HttpError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.writer.flush().await?;
        let mut reader = File::from_std(self.spool.reopen()?);
        Ok(tokio::io::copy(&mut reader, dst).await?)
    }

    /// 完成编码，转为可共享、可重放的请求体句柄
    pub async fn finish(mut self) -> Result<MultipartBody, HttpError> {
        self.writer.flush().await?;
        let content_length = self.spool.as_file().metadata()?.len();
        Ok(MultipartBody {
            boundary: self.boundary,
            content_length,
            spool: Arc::new(self.spool),
        })
    }

    /// 缓冲文件路径（仅测试用）
    #[cfg(test)]
    pub fn spool_path(&self) -> std::path::PathBuf {
        self.spool.path().to_path_buf()
    }
}

/// 已完成编码的 multipart 请求体
///
/// 缓冲文件由一个 RequestBuilder 独占持有；clone 只共享句柄，
/// 最后一个持有者释放时文件自动删除，包括失败路径
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    content_length: u64,
    spool: Arc<NamedTempFile>,
}

impl MultipartBody {
    /// 边界串
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// 请求体总字节数
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// 重新打开缓冲文件，供一次流式发送使用
    ///
    /// 每次调用从头读取，跨 scheme 重定向重发请求时整个请求体可重放
    pub fn open_stream(&self) -> Result<File, HttpError> {
        Ok(File::from_std(self.spool.reopen()?))
    }

    /// 缓冲文件路径（仅测试用）
    #[cfg(test)]
    pub fn spool_path(&self) -> std::path::PathBuf {
        self.spool.path().to_path_buf()
    }
}

fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    (0..BOUNDARY_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

// =====================================================
// 单元测试
// =====================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn encode_to_string(encoder: &mut MultipartEncoder) -> String {
        let mut buf = Vec::new();
        encoder.write_to(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_boundary_generation() {
        let a = generate_boundary();
        let b = generate_boundary();
        assert_eq!(a.len(), BOUNDARY_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        // 两次生成相同的概率可忽略
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_text_and_file_part_framing() {
        let mut encoder = MultipartEncoder::new().unwrap();
        let boundary = encoder.boundary().to_string();

        encoder.write_first_boundary_if_needed().await.unwrap();
        encoder.add_part("description", "crash report").await.unwrap();
        let mut data: &[u8] = b"attachment bytes";
        encoder
            .add_file_part("attachment0", "report.log", &mut data, true)
            .await
            .unwrap();
        encoder.write_last_boundary_if_needed().await.unwrap();

        let body = encode_to_string(&mut encoder).await;

        // 起始边界
        assert!(body.starts_with(&format!("--{}\r\n", boundary)));
        // 文本字段
        assert!(body.contains("Content-Disposition: form-data; name=\"description\"\r\n\r\ncrash report"));
        // 文件字段恰好一个
        let disposition = "Content-Disposition: form-data; name=\"attachment0\"; filename=\"report.log\"";
        assert_eq!(body.matches(disposition).count(), 1);
        assert!(body.contains("Content-Type: application/octet-stream\r\n\r\nattachment bytes"));
        // 以结束边界收尾
        assert!(body.ends_with(&format!("\r\n--{}--\r\n", boundary)));
    }

    #[tokio::test]
    async fn test_non_last_file_part_followed_by_separator() {
        let mut encoder = MultipartEncoder::new().unwrap();
        let boundary = encoder.boundary().to_string();

        encoder.write_first_boundary_if_needed().await.unwrap();
        let mut first: &[u8] = b"one";
        encoder
            .add_file_part("attachment0", "a.log", &mut first, false)
            .await
            .unwrap();
        let mut second: &[u8] = b"two";
        encoder
            .add_file_part("attachment1", "b.log", &mut second, true)
            .await
            .unwrap();

        let body = encode_to_string(&mut encoder).await;

        // 非末尾字段之后是分隔边界而不是结束边界
        assert!(body.contains(&format!("one\r\n--{}\r\nContent-Disposition", boundary)));
        assert!(body.ends_with(&format!("two\r\n--{}--\r\n", boundary)));
        // 结束边界只出现一次
        assert_eq!(body.matches(&format!("--{}--", boundary)).count(), 1);
    }

    #[tokio::test]
    async fn test_boundary_guards_idempotent() {
        let mut encoder = MultipartEncoder::new().unwrap();
        let boundary = encoder.boundary().to_string();

        encoder.write_first_boundary_if_needed().await.unwrap();
        encoder.write_first_boundary_if_needed().await.unwrap();
        encoder.write_last_boundary_if_needed().await.unwrap();
        encoder.write_last_boundary_if_needed().await.unwrap();

        let body = encode_to_string(&mut encoder).await;
        assert_eq!(body, format!("--{}\r\n\r\n--{}--\r\n", boundary, boundary));
    }

    #[tokio::test]
    async fn test_content_length_matches_output() {
        let mut encoder = MultipartEncoder::new().unwrap();
        encoder.write_first_boundary_if_needed().await.unwrap();
        encoder.add_part("key", "value").await.unwrap();
        let mut data: &[u8] = b"payload";
        encoder
            .add_file_part("attachment0", "p.bin", &mut data, true)
            .await
            .unwrap();

        let declared = encoder.content_length().await.unwrap();
        let mut buf = Vec::new();
        let written = encoder.write_to(&mut buf).await.unwrap();

        assert_eq!(declared, written);
        assert_eq!(declared as usize, buf.len());
    }

    #[tokio::test]
    async fn test_finished_body_replayable_and_deleted_on_drop() {
        let mut encoder = MultipartEncoder::new().unwrap();
        encoder.write_first_boundary_if_needed().await.unwrap();
        encoder.add_part("key", "value").await.unwrap();
        encoder.write_last_boundary_if_needed().await.unwrap();

        let body = encoder.finish().await.unwrap();
        let path = body.spool_path();
        assert!(path.exists());

        // 两次打开都能从头读到完整内容
        for _ in 0..2 {
            let mut stream = body.open_stream().unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf.len() as u64, body.content_length());
        }

        let cloned = body.clone();
        drop(body);
        // 仍有持有者，文件保留
        assert!(path.exists());
        drop(cloned);
        // 最后一个持有者释放后缓冲文件被删除
        assert!(!path.exists());
    }
}
