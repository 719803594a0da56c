// 外部传输服务接口

use crate::transfer::{TransferError, TransferHandle, TransferStatus};
use async_trait::async_trait;

/// 外部传输服务
///
/// 实际执行下载的外部服务，只在接口边界上建模：
/// 入队、按句柄查询状态、取消移除
#[async_trait]
pub trait TransferService: Send + Sync {
    /// 入队一个下载任务，返回服务分配的句柄
    async fn enqueue(&self, url: &str) -> Result<TransferHandle, TransferError>;

    /// 查询任务状态快照
    ///
    /// 句柄未知或查询本身失败时返回 `TransferError::NotFound`
    async fn query_status(&self, handle: TransferHandle)
        -> Result<TransferStatus, TransferError>;

    /// 取消并移除任务
    ///
    /// 移除后对该句柄的后续查询将返回 `NotFound`
    async fn remove(&self, handle: TransferHandle) -> Result<(), TransferError>;
}
