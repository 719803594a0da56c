//! 底层传输接口与 reqwest 实现
//!
//! RequestBuilder 组装好的连接属性通过 [`ConnectionSpec`] 交给传输层打开连接。
//! 重定向分工：同 scheme 重定向由传输层在预算内自动跟随；
//! 跨 scheme 重定向原样返回给上层手动处理（断开重连）。

use crate::http::{HttpError, MultipartBody};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH};
use reqwest::{redirect, Body, Client, Method, Url};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// 最大重定向跳数
///
/// 同 scheme 自动跟随与跨 scheme 手动重连共用同一预算值
pub const MAX_REDIRECTS: u32 = 6;

/// 请求体
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// 无请求体
    Empty,
    /// UTF-8 文本体
    Text(String),
    /// 已落盘的 multipart 体，按 Content-Length 声明后流式发送
    Multipart(MultipartBody),
}

/// 一次连接的全部属性
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub method: Method,
    pub url: Url,
    /// 请求头，键唯一
    pub headers: HashMap<String, String>,
    /// 连接与读取超时
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub body: RequestBody,
}

/// 底层传输
///
/// 约定：follow_redirects 开启时，实现自动跟随同 scheme 的
/// 301/302/303 重定向，最多 [`MAX_REDIRECTS`] 跳；遇到跨 scheme
/// 重定向或预算耗尽时停住，把重定向响应原样返回给上层
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn Connection>, HttpError>;
}

/// 一次已打开的连接（响应侧视图）
#[async_trait]
pub trait Connection: Send {
    /// HTTP 状态码
    fn status(&self) -> u16;

    /// 响应对应的最终 URL（自动跟随之后的落点）
    fn url(&self) -> &Url;

    /// 读取响应头，名称不区分大小写
    fn header(&self, name: &str) -> Option<String>;

    /// 显式断开连接，释放底层资源
    fn disconnect(self: Box<Self>);

    /// 读取完整响应体
    async fn text(self: Box<Self>) -> Result<String, HttpError>;
}

// =====================================================
// reqwest 实现
// =====================================================

/// 基于 reqwest 的生产传输实现
pub struct ReqwestTransport {
    /// 不跟随任何重定向的客户端
    direct: Client,
    /// 只在预算内跟随同 scheme 重定向的客户端
    same_scheme: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, HttpError> {
        let direct = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;

        // 同 scheme 的 301/302/303 在预算内自动跟随；
        // 跨 scheme、其他重定向状态码或预算耗尽时停在当前响应
        let same_scheme = Client::builder()
            .redirect(redirect::Policy::custom(|attempt| {
                if !matches!(attempt.status().as_u16(), 301 | 302 | 303) {
                    return attempt.stop();
                }
                if attempt.previous().len() > MAX_REDIRECTS as usize {
                    return attempt.stop();
                }
                let same_scheme = attempt
                    .previous()
                    .last()
                    .map(|prev| prev.scheme() == attempt.url().scheme())
                    .unwrap_or(false);
                if same_scheme {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()?;

        Ok(Self {
            direct,
            same_scheme,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn Connection>, HttpError> {
        // 属性应用顺序：重定向开关、禁用缓存、超时、方法、请求头、请求体
        let client = if spec.follow_redirects {
            &self.same_scheme
        } else {
            &self.direct
        };

        let mut request = client
            .request(spec.method.clone(), spec.url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .timeout(spec.timeout);

        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match &spec.body {
            RequestBody::Empty => request,
            RequestBody::Text(text) => request.body(text.clone()),
            RequestBody::Multipart(body) => {
                let stream = ReaderStream::new(body.open_stream()?);
                request
                    .header(CONTENT_LENGTH, body.content_length())
                    .body(Body::wrap_stream(stream))
            }
        };

        debug!("打开连接: {} {}", spec.method, spec.url);
        let response = request.send().await?;
        Ok(Box::new(ReqwestConnection { response }))
    }
}

/// reqwest 连接包装
struct ReqwestConnection {
    response: reqwest::Response,
}

#[async_trait]
impl Connection for ReqwestConnection {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn url(&self) -> &Url {
        self.response.url()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn disconnect(self: Box<Self>) {
        // 丢弃响应即中断底层连接
        drop(self);
    }

    async fn text(self: Box<Self>) -> Result<String, HttpError> {
        Ok(self.response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_spec_clone_shares_multipart_spool() {
        // ConnectionSpec 需要 Clone 以便跨 scheme 重发，构造一个纯文本体验证
        let spec = ConnectionSpec {
            method: Method::POST,
            url: Url::parse("http://example.com/upload").unwrap(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(1),
            follow_redirects: false,
            body: RequestBody::Text("payload".to_string()),
        };
        let cloned = spec.clone();
        assert_eq!(cloned.url.as_str(), "http://example.com/upload");
        assert!(matches!(cloned.body, RequestBody::Text(ref t) if t == "payload"));
    }
}
