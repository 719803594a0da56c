//! HTTP 请求构建器
//!
//! 链式配置方法、请求头、请求体与超时，一次 build 完成发送，
//! 并手动解析跨 scheme 重定向（底层传输只自动跟随同 scheme 跳转）

use crate::http::multipart::MultipartEncoder;
use crate::http::{
    AttachmentSource, Connection, ConnectionSpec, HttpError, MultipartBody, RequestBody,
    Transport, MAX_REDIRECTS,
};
use async_recursion::async_recursion;
use base64::engine::general_purpose;
use base64::Engine as _;
use reqwest::{Method, Url};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 默认超时：2 分钟
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// 默认 User-Agent，构建器创建时即安装
pub const DEFAULT_USER_AGENT: &str = "transfer-orchestrator/1.2";

/// 单个表单字段值的最大字节数
pub const FORM_FIELD_LIMIT: usize = 4 * 1024 * 1024;

/// 表单字段数量上限
pub const FIELDS_LIMIT: usize = 25;

/// HTTP 请求构建器
///
/// 配置方法均返回构建器自身以便链式调用；校验失败的配置方法
/// 同步返回错误。build 之后构建器即被消费
pub struct RequestBuilder {
    transport: Arc<dyn Transport>,
    url: String,
    method: Method,
    headers: HashMap<String, String>,
    body: Option<String>,
    multipart: Option<MultipartBody>,
    timeout: Duration,
    follow_redirects: bool,
}

impl RequestBuilder {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        Self {
            transport,
            url: url.into(),
            method: Method::GET,
            headers,
            body: None,
            multipart: None,
            timeout: DEFAULT_TIMEOUT,
            follow_redirects: false,
        }
    }

    pub fn set_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 设置连接与读取超时
    ///
    /// Duration 无符号，源平台的负超时检查由类型系统保证
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// 设置请求头，同名覆盖
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// 安装 Basic 认证头
    pub fn set_basic_auth(self, username: &str, password: &str) -> Self {
        let token = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
        self.set_header("Authorization", format!("Basic {}", token))
    }

    /// 写入 application/x-www-form-urlencoded 表单体
    ///
    /// 限制字段数量与单字段大小，避免病态输入导致内存失控
    pub fn write_form_fields(
        mut self,
        fields: &HashMap<String, String>,
    ) -> Result<Self, HttpError> {
        if fields.len() > FIELDS_LIMIT {
            return Err(HttpError::LimitExceeded(format!(
                "表单字段过多: {} 个, 上限 {} 个",
                fields.len(),
                FIELDS_LIMIT
            )));
        }
        for (key, value) in fields {
            if value.len() > FORM_FIELD_LIMIT {
                return Err(HttpError::LimitExceeded(format!(
                    "表单字段 \"{}\" 过大: {} 字节, 上限 {} 字节",
                    key,
                    value.len(),
                    FORM_FIELD_LIMIT
                )));
            }
        }

        let encoded: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        self.body = Some(encoded.join("&"));
        Ok(self.set_header("Content-Type", "application/x-www-form-urlencoded"))
    }

    /// 写入 multipart/form-data 请求体
    ///
    /// 文本字段按切片顺序编码；每个附件作为 attachment<i> 文件字段，
    /// 文件名取引用的最后一段路径。结束边界的位置由附件在列表中的
    /// 位置决定，调用方无法写出错误的收尾框架
    pub async fn write_multipart_data(
        mut self,
        fields: &[(String, String)],
        attachments: &[String],
        source: &dyn AttachmentSource,
    ) -> Result<Self, HttpError> {
        let mut encoder = MultipartEncoder::new()?;
        encoder.write_first_boundary_if_needed().await?;

        for (name, value) in fields {
            encoder.add_part(name, value).await?;
        }

        for (index, reference) in attachments.iter().enumerate() {
            let is_last = index == attachments.len() - 1;
            let filename = last_path_segment(reference);
            let mut stream = source.open(reference).await?;
            encoder
                .add_file_part(&format!("attachment{}", index), &filename, &mut stream, is_last)
                .await?;
        }

        encoder.write_last_boundary_if_needed().await?;
        let body = encoder.finish().await?;
        let content_type = format!("multipart/form-data; boundary={}", body.boundary());
        self.multipart = Some(body);
        Ok(self.set_header("Content-Type", content_type))
    }

    /// 构建并发送请求，返回最终到达的连接
    pub async fn build(self) -> Result<Box<dyn Connection>, HttpError> {
        let url = Url::parse(&self.url).map_err(|e| {
            HttpError::InvalidArgument(format!("无法解析 URL \"{}\": {}", self.url, e))
        })?;
        self.create_connection(url, MAX_REDIRECTS).await
    }

    /// 递归解析重定向
    ///
    /// 同 scheme 重定向交由传输层自动跟随；跨 scheme 时显式断开
    /// 当前连接，携带递减的跳数预算重新发起。预算耗尽不报错，
    /// 原样返回当前到达的连接
    #[async_recursion]
    async fn create_connection(
        &self,
        url: Url,
        remaining_redirects: u32,
    ) -> Result<Box<dyn Connection>, HttpError> {
        let spec = self.connection_spec(url);
        let connection = self.transport.open(&spec).await?;

        if !self.follow_redirects {
            return Ok(connection);
        }

        if matches!(connection.status(), 301 | 302 | 303) {
            if remaining_redirects == 0 {
                // 停止重定向
                return Ok(connection);
            }

            let location = connection.header("Location").ok_or_else(|| {
                HttpError::Transport("重定向响应缺少 Location 头".to_string())
            })?;
            let moved = Url::parse(&location).map_err(|e| {
                HttpError::Transport(format!("重定向目标无效 \"{}\": {}", location, e))
            })?;

            if moved.scheme() != connection.url().scheme() {
                // 传输层不跨 scheme 自动跟随，手动断开重连
                debug!("跨 scheme 重定向: {} -> {}", connection.url(), moved);
                connection.disconnect();
                return self.create_connection(moved, remaining_redirects - 1).await;
            }
        }

        Ok(connection)
    }

    fn connection_spec(&self, url: Url) -> ConnectionSpec {
        let body = if let Some(ref multipart) = self.multipart {
            RequestBody::Multipart(multipart.clone())
        } else if let Some(ref text) = self.body {
            RequestBody::Text(text.clone())
        } else {
            RequestBody::Empty
        };
        ConnectionSpec {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            timeout: self.timeout,
            follow_redirects: self.follow_redirects,
            body,
        }
    }
}

/// 取引用的最后一段路径作为展示文件名
fn last_path_segment(reference: &str) -> String {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference)
        .to_string()
}

// =====================================================
// 单元测试
// =====================================================
