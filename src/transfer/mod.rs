// 传输服务边界模块
//
// 定义外部传输服务的接口和数据类型，实际下载由外部服务执行

pub mod service;
pub mod types;

pub use service::TransferService;
pub use types::{TransferError, TransferHandle, TransferStatus};
