//! UART 链路指标
//!
//! 原子计数器，可以在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
///
/// 发送路径（调用方线程）和投递回调（传输层线程）都会更新这些计数器。
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 发送的写访问帧数
    pub write_frames: AtomicU64,

    /// 发送的读请求帧数
    pub read_requests: AtomicU64,

    /// 投递回调收到的字节块数（包括迟到的应答）
    pub replies_received: AtomicU64,

    /// 等待应答超时次数
    pub read_timeouts: AtomicU64,

    /// 校验失败的应答数（长度、同步字节、CRC）
    pub corrupt_replies: AtomicU64,

    /// 空应答次数
    pub empty_replies: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> LinkMetricsSnapshot {
        LinkMetricsSnapshot {
            write_frames: self.write_frames.load(Ordering::Relaxed),
            read_requests: self.read_requests.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            corrupt_replies: self.corrupt_replies.load(Ordering::Relaxed),
            empty_replies: self.empty_replies.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.write_frames.store(0, Ordering::Relaxed);
        self.read_requests.store(0, Ordering::Relaxed);
        self.replies_received.store(0, Ordering::Relaxed);
        self.read_timeouts.store(0, Ordering::Relaxed);
        self.corrupt_replies.store(0, Ordering::Relaxed);
        self.empty_replies.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkMetricsSnapshot {
    pub write_frames: u64,
    pub read_requests: u64,
    pub replies_received: u64,
    pub read_timeouts: u64,
    pub corrupt_replies: u64,
    pub empty_replies: u64,
}

impl LinkMetricsSnapshot {
    /// 发送的帧总数
    pub fn frames_sent(&self) -> u64 {
        self.write_frames + self.read_requests
    }

    /// 读请求成功率（百分比）
    ///
    /// 成功指在超时内收到通过校验的应答。没有读请求时返回 100.0。
    pub fn read_success_rate(&self) -> f64 {
        if self.read_requests == 0 {
            return 100.0;
        }
        let failed = self.read_timeouts + self.corrupt_replies + self.empty_replies;
        let ok = self.read_requests.saturating_sub(failed);
        (ok as f64 / self.read_requests as f64) * 100.0
    }
}

impl std::fmt::Display for LinkMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "writes={}, reads={}, replies={}, timeouts={}, corrupt={}, empty={} ({:.1}% ok)",
            self.write_frames,
            self.read_requests,
            self.replies_received,
            self.read_timeouts,
            self.corrupt_replies,
            self.empty_replies,
            self.read_success_rate()
        )
    }
}
