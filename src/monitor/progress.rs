//! 下载进度监视服务
//!
//! 驱动单个传输从入队到终态：
//! - 通过外部传输服务入队，拿到句柄后立即回调 on_started
//! - 固定节奏轮询状态，把服务端状态翻译成监听器事件
//! - 终态（成功/失败）只送达一次，之后永久停止轮询
//!
//! ## 设计要点
//! - start 立即返回，轮询在后台任务上进行，不阻塞调用方
//! - 轮询间隔从一次轮询结束时刻起算，同一句柄任意时刻至多一个在途查询
//! - stop 设置取消令牌并通知服务移除任务，下个周期即终止，不再发起网络调用

use crate::monitor::{CallbackContext, TransferListener};
use crate::transfer::{TransferError, TransferHandle, TransferService, TransferStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// =====================================================
// 轮询配置
// =====================================================

/// 轮询配置
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// 两次轮询之间的固定间隔（默认 500 毫秒），
    /// 从上一次轮询完成时刻起算
    pub check_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            check_delay: Duration::from_millis(500),
        }
    }
}

impl PollingConfig {
    /// 创建用于测试的快速配置
    #[cfg(test)]
    pub fn fast_for_testing() -> Self {
        Self {
            check_delay: Duration::from_millis(5),
        }
    }
}

// =====================================================
// 下载进度监视器
// =====================================================

/// 下载进度监视器
///
/// 负责一个传输的完整生命周期，事件通过串行回调上下文异步送达
pub struct DownloadProgressMonitor {
    /// 外部传输服务
    service: Arc<dyn TransferService>,
    /// 轮询配置
    config: PollingConfig,
    /// 回调上下文（监听器事件统一在此串行执行）
    callback_ctx: CallbackContext,
    /// 取消令牌，stop 时设置，每个轮询周期开头检查
    cancel: CancellationToken,
    /// 轮询循环是否在运行
    running: Arc<AtomicBool>,
    /// 本次传输的句柄，入队成功后写入
    handle: Arc<RwLock<Option<TransferHandle>>>,
}

impl DownloadProgressMonitor {
    /// 创建监视器，使用默认轮询配置
    pub fn new(service: Arc<dyn TransferService>, callback_ctx: CallbackContext) -> Self {
        Self::with_config(service, callback_ctx, PollingConfig::default())
    }

    /// 使用自定义轮询配置创建监视器
    pub fn with_config(
        service: Arc<dyn TransferService>,
        callback_ctx: CallbackContext,
        config: PollingConfig,
    ) -> Self {
        Self {
            service,
            config,
            callback_ctx,
            cancel: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// 轮询循环是否在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 本次传输的句柄（入队完成前为 None）
    pub async fn current_handle(&self) -> Option<TransferHandle> {
        *self.handle.read().await
    }

    /// 启动传输并开始轮询
    ///
    /// 立即返回。入队、轮询都在后台任务上进行；入队失败只产生
    /// 一次 on_fail，不会有 on_started
    pub fn start(&self, url: impl Into<String>, listener: Arc<dyn TransferListener>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("监视器已在运行，忽略重复的 start 调用");
            return;
        }

        let url = url.into();
        let service = Arc::clone(&self.service);
        let ctx = self.callback_ctx.clone();
        let cancel = self.cancel.clone();
        let running = Arc::clone(&self.running);
        let handle_slot = Arc::clone(&self.handle);
        let check_delay = self.config.check_delay;

        tokio::spawn(async move {
            let handle = match service.enqueue(&url).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!("传输入队失败: url={}, 错误: {}", url, e);
                    let message = e.to_string();
                    ctx.dispatch(move || listener.on_fail(message));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            *handle_slot.write().await = Some(handle);
            info!("传输已入队: handle={}, url={}", handle, url);
            {
                let listener = Arc::clone(&listener);
                ctx.dispatch(move || listener.on_started(handle));
            }

            Self::poll_until_terminal(service, ctx, cancel, handle, check_delay, listener)
                .await;

            running.store(false, Ordering::SeqCst);
            debug!("监视循环退出: handle={}", handle);
        });
    }

    /// 轮询循环
    ///
    /// 状态机: Started → { Running → Running → … } → { Succeeded | Failed }，
    /// 不会回退，终态后永久停止
    async fn poll_until_terminal(
        service: Arc<dyn TransferService>,
        ctx: CallbackContext,
        cancel: CancellationToken,
        handle: TransferHandle,
        check_delay: Duration,
        listener: Arc<dyn TransferListener>,
    ) {
        loop {
            // stop 之后不再发起任何网络调用，直接以失败终态收尾
            if cancel.is_cancelled() {
                info!("传输已取消: handle={}", handle);
                ctx.dispatch(move || listener.on_fail("transfer cancelled".to_string()));
                return;
            }

            match service.query_status(handle).await {
                Err(e) => {
                    // 句柄失效或服务不可用，失败终态，不重试
                    warn!("状态查询失败: handle={}, 错误: {}", handle, e);
                    let message = e.to_string();
                    ctx.dispatch(move || listener.on_fail(message));
                    return;
                }
                Ok(TransferStatus::Failed { reason }) => {
                    warn!("传输失败: handle={}, 原因: {}", handle, reason);
                    let message = format!("Failed with reason: {}", reason);
                    ctx.dispatch(move || listener.on_fail(message));
                    return;
                }
                Ok(TransferStatus::Succeeded { result_location }) => {
                    info!("传输成功: handle={}, 产物: {}", handle, result_location);
                    ctx.dispatch(move || listener.on_success(result_location));
                    return;
                }
                Ok(TransferStatus::Pending {
                    bytes_downloaded,
                    bytes_total,
                })
                | Ok(TransferStatus::Running {
                    bytes_downloaded,
                    bytes_total,
                }) => {
                    debug!(
                        "传输进行中: handle={}, {}/{} 字节",
                        handle, bytes_downloaded, bytes_total
                    );
                    let listener = Arc::clone(&listener);
                    ctx.dispatch(move || listener.on_progress(bytes_downloaded, bytes_total));
                }
            }

            // 间隔从本次轮询完成时刻起算，保证查询永不重叠
            tokio::time::sleep(check_delay).await;
        }
    }

    /// 停止传输
    ///
    /// 设置取消令牌并请求服务移除任务。轮询循环在下个周期开头
    /// 观察到令牌后立即终止
    pub async fn stop(&self, handle: TransferHandle) -> Result<(), TransferError> {
        self.cancel.cancel();
        let result = self.service.remove(handle).await;
        match &result {
            Ok(()) => info!("传输已请求移除: handle={}", handle),
            Err(e) => warn!("传输移除失败: handle={}, 错误: {}", handle, e),
        }
        result
    }
}

/// 一次性下载入口
///
/// 创建监视器并立即启动，返回监视器供调用方后续 stop
pub fn download(
    service: Arc<dyn TransferService>,
    callback_ctx: CallbackContext,
    url: impl Into<String>,
    listener: Arc<dyn TransferListener>,
) -> DownloadProgressMonitor {
    let monitor = DownloadProgressMonitor::new(service, callback_ctx);
    monitor.start(url, listener);
    monitor
}

// =====================================================
// 单元测试
// =====================================================
