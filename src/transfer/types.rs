// 传输服务边界类型定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =====================================================
// 传输句柄
// =====================================================

/// 传输句柄
///
/// 任务入队时由外部传输服务分配的不透明标识，
/// 分配后在整个传输生命周期内不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferHandle(pub u64);

impl std::fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =====================================================
// 传输状态快照
// =====================================================

/// 传输状态快照
///
/// 每次轮询从服务端重新读取，不跨轮询缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferStatus {
    /// 等待中（字节数尚未统计，按 0 上报）
    Pending {
        bytes_downloaded: u64,
        bytes_total: u64,
    },
    /// 传输进行中
    Running {
        bytes_downloaded: u64,
        bytes_total: u64,
    },
    /// 传输成功，携带产物的不透明引用
    Succeeded { result_location: String },
    /// 传输失败，携带失败原因
    Failed { reason: String },
}

impl TransferStatus {
    /// 判断是否为终态（成功或失败）
    ///
    /// 终态之后不再有任何状态迁移
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Succeeded { .. } | TransferStatus::Failed { .. }
        )
    }

    /// 判断任务是否仍在推进（等待或进行中）
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransferStatus::Pending { .. } | TransferStatus::Running { .. }
        )
    }

    /// 计算进度百分比，返回 0.0 - 100.0
    pub fn progress_percent(&self) -> f32 {
        match self {
            TransferStatus::Pending {
                bytes_downloaded,
                bytes_total,
            }
            | TransferStatus::Running {
                bytes_downloaded,
                bytes_total,
            } => {
                if *bytes_total == 0 {
                    0.0
                } else {
                    ((*bytes_downloaded as f64 / *bytes_total as f64) * 100.0) as f32
                }
            }
            TransferStatus::Succeeded { .. } => 100.0,
            TransferStatus::Failed { .. } => 0.0,
        }
    }
}

// =====================================================
// 传输服务错误
// =====================================================

/// 传输服务错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// 句柄未知或已被移除
    #[error("任务不存在: handle={0}")]
    NotFound(TransferHandle),
    /// 服务调用失败（网络不可达、响应异常等）
    #[error("传输服务调用失败: {0}")]
    Service(String),
}
