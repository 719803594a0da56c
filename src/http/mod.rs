// HTTP 请求构建模块
//
// 不依赖高层客户端的请求组装：multipart 流式编码、表单编码、
// Basic 认证、手动跨 scheme 重定向解析

pub mod attachment;
pub mod builder;
pub mod error;
pub mod multipart;
pub mod transport;

pub use attachment::{AttachmentSource, FileAttachmentSource};
pub use builder::{
    RequestBuilder, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FIELDS_LIMIT, FORM_FIELD_LIMIT,
};
pub use error::HttpError;
pub use multipart::{MultipartBody, MultipartEncoder};
pub use transport::{
    Connection, ConnectionSpec, RequestBody, ReqwestTransport, Transport, MAX_REDIRECTS,
};
