//! 暂停/停止控制
//!
//! 协作式：只在每道题、每一轮开始前检查，已经开始的操作总会执行完。
//!
//! 停止请求作用于当前运行；空闲时发出的停止请求留给下一次运行，
//! 该次运行在处理第一道题之前结束。运行结束时清除停止标记，暂停状态保留。

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// 提前结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Paused,
    Stopped,
}

impl std::fmt::Display for Interruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interruption::Paused => write!(f, "已暂停"),
            Interruption::Stopped => write!(f, "已停止"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunControl {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("⏸️ 已请求暂停");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("▶️ 继续运行");
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        info!("⏹️ 已请求停止");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 清除停止标记（暂停状态保留）
    pub fn reset_stop(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// 一次运行期间持有，释放时清除停止标记
    pub fn run_scope(&self) -> RunScope<'_> {
        if self.is_stopped() {
            info!("⏹️ 运行开始前已请求停止");
        }
        RunScope(self)
    }

    /// 检查点：需要提前结束时返回原因
    pub fn checkpoint(&self) -> Option<Interruption> {
        if self.is_stopped() {
            Some(Interruption::Stopped)
        } else if self.is_paused() {
            Some(Interruption::Paused)
        } else {
            None
        }
    }
}

pub struct RunScope<'a>(&'a RunControl);

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        self.0.reset_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint() {
        let control = RunControl::new();
        assert_eq!(control.checkpoint(), None);

        control.pause();
        assert_eq!(control.checkpoint(), Some(Interruption::Paused));

        control.stop();
        assert_eq!(control.checkpoint(), Some(Interruption::Stopped));

        control.reset_stop();
        control.resume();
        assert_eq!(control.checkpoint(), None);
    }

    #[test]
    fn test_stop_is_cleared_when_run_ends() {
        let control = RunControl::new();
        control.stop();
        {
            let _scope = control.run_scope();
            // 运行前的停止请求对本次运行有效
            assert_eq!(control.checkpoint(), Some(Interruption::Stopped));
        }
        assert_eq!(control.checkpoint(), None);
    }
}
