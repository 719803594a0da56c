// 串行回调上下文

use tokio::sync::mpsc;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 串行回调上下文
///
/// 所有监听器回调统一派发到同一个后台任务顺序执行，保证同一句柄的
/// 事件不会并发送达，也不会乱序。轮询在工作任务上进行，永远不会
/// 阻塞回调上下文本身。
///
/// 可在多个监视器之间共享（clone 共享同一个执行队列），
/// 替代源实现中进程级的主线程 Handler 单例
#[derive(Clone)]
pub struct CallbackContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl CallbackContext {
    /// 创建上下文并启动专属的回调执行任务
    ///
    /// 必须在 tokio 运行时内调用
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!("回调上下文执行任务退出");
        });
        Self { tx }
    }

    /// 将一个回调排入串行队列
    ///
    /// 上下文已关闭时静默丢弃
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Box::new(job));
    }
}

impl Default for CallbackContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatch_preserves_order() {
        let ctx = CallbackContext::new();
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100u32 {
            let seen = Arc::clone(&seen);
            ctx.dispatch(move || seen.lock().unwrap().push(i));
        }

        // 等待队列排空
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = seen.lock().unwrap();
        let expected: Vec<u32> = (0..100).collect();
        assert_eq!(*seen, expected);
    }

    #[tokio::test]
    async fn test_clone_shares_queue() {
        let ctx = CallbackContext::new();
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let a = ctx.clone();
        let s = Arc::clone(&seen);
        a.dispatch(move || s.lock().unwrap().push("a"));
        let s = Arc::clone(&seen);
        ctx.dispatch(move || s.lock().unwrap().push("b"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
