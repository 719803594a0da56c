// 传输生命周期监听器

use crate::transfer::TransferHandle;

/// 传输生命周期监听器
///
/// 同一句柄的事件严格按 on_started → 零或多次 on_progress →
/// 恰好一次 on_success / on_fail 的顺序送达，终态事件之后
/// 不再有任何回调。所有回调都在监视器的串行回调上下文中执行。
pub trait TransferListener: Send + Sync {
    /// 任务已入队，句柄可用
    fn on_started(&self, handle: TransferHandle);

    /// 进度更新（等待或进行中的每个轮询周期触发一次）
    fn on_progress(&self, bytes_downloaded: u64, bytes_total: u64);

    /// 传输成功，携带产物引用；终态
    fn on_success(&self, result_location: String);

    /// 传输失败，携带可读的失败描述；终态
    fn on_fail(&self, message: String);
}
