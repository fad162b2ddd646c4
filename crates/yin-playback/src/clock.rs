//! 音频时钟.
//!
//! 调度器的所有时间 (音源起止、淡入淡出) 都以时钟读数为准.
//! 时钟单调递增, 不受逻辑上的暂停影响.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 音频时钟
pub trait AudioClock: Send + Sync {
    /// 当前时间 (秒)
    fn now(&self) -> f64;
}

/// 手动推进的时钟 (线程安全, 克隆后共享同一读数)
///
/// 用于测试与离线渲染.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// f64 的位模式
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 前进 `seconds` 秒, 负值被忽略
    pub fn advance(&self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.set(self.now() + seconds);
        }
    }

    /// 设置读数, 不允许回退
    pub fn set(&self, seconds: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (seconds > f64::from_bits(bits)).then(|| seconds.to_bits())
            });
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// 基于 `Instant` 的系统时钟
#[derive(Debug, Clone)]
pub struct SystemClock {
    start_time: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
