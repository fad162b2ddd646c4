//! 解码缓冲与调度中的音源描述.

use crate::fade::GainEnvelope;
use crate::pool::{PlanarStorage, PoolKey};

/// 音源标识
pub type SourceId = u64;

/// 解码线程产出的一段 PCM
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPcmBuffer {
    pub channel_count: usize,
    pub sample_rate: u32,
    /// 平面样本, 每声道 `length` 帧
    pub samples: PlanarStorage,
    pub length: usize,
    /// 起始时间 (秒, 纳秒精度), 相对音轨起点
    pub start_time: f64,
    /// 结束时间 (秒, 纳秒精度)
    pub end_time: f64,
    /// 是否为音轨的最后一个缓冲
    pub is_last_buffer: bool,
    /// 解码耗时 (秒)
    pub decoding_latency: f64,
}

impl DecodedPcmBuffer {
    /// 时长 (秒)
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length as f64 / f64::from(self.sample_rate)
    }

    pub fn pool_key(&self) -> PoolKey {
        PoolKey::new(self.channel_count, self.sample_rate)
    }

    /// 取走样本存储 (归还缓冲池用)
    pub fn take_samples(&mut self) -> PlanarStorage {
        std::mem::take(&mut self.samples)
    }
}

/// 调度中的一个音源
///
/// `started`/`stopped` 为时钟时间, 未调度时为 -1.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub buffer: DecodedPcmBuffer,
    pub started: f64,
    pub stopped: f64,
    /// 暂停前已播放的时长 (秒)
    pub played_so_far: f64,
    /// 属于预加载的下一首
    pub background: bool,
    /// 音源自己的增益包络 (交叉淡化)
    pub envelope: Option<GainEnvelope>,
}

impl SourceDescriptor {
    pub fn new(id: SourceId, buffer: DecodedPcmBuffer, background: bool) -> Self {
        Self {
            id,
            buffer,
            started: -1.0,
            stopped: -1.0,
            played_so_far: 0.0,
            background,
            envelope: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }

    /// 尚未播放的时长
    pub fn remaining_duration(&self) -> f64 {
        (self.duration() - self.played_so_far).max(0.0)
    }

    pub fn is_scheduled(&self) -> bool {
        self.started >= 0.0
    }

    /// `time` 时刻是否正在播放
    pub fn contains(&self, time: f64) -> bool {
        self.is_scheduled() && time >= self.started && time < self.stopped
    }

    /// `time` 时刻对应缓冲内的帧位置
    pub fn frame_at(&self, time: f64) -> usize {
        let seconds = self.played_so_far + (time - self.started).max(0.0);
        ((seconds * f64::from(self.buffer.sample_rate)) as usize).min(self.buffer.length)
    }

    /// 标记为未调度
    pub fn unschedule(&mut self) {
        self.started = -1.0;
        self.stopped = -1.0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 构造一个常量样本的测试缓冲
    pub(crate) fn constant_buffer(value: f32, frames: usize, start_time: f64) -> DecodedPcmBuffer {
        DecodedPcmBuffer {
            channel_count: 2,
            sample_rate: 1000,
            samples: vec![vec![value; frames]; 2],
            length: frames,
            start_time,
            end_time: start_time + frames as f64 / 1000.0,
            is_last_buffer: false,
            decoding_latency: 0.0,
        }
    }

    #[test]
    fn test_剩余时长与帧位置() {
        let mut sd = SourceDescriptor::new(1, constant_buffer(0.0, 2000, 0.0), false);
        assert!(!sd.is_scheduled());
        assert_eq!(sd.remaining_duration(), 2.0);
        sd.played_so_far = 0.5;
        sd.started = 10.0;
        sd.stopped = 11.5;
        assert_eq!(sd.remaining_duration(), 1.5);
        assert!(sd.contains(10.0));
        assert!(!sd.contains(11.5));
        assert_eq!(sd.frame_at(10.25), 750);
        assert_eq!(sd.frame_at(100.0), 2000);
        sd.unschedule();
        assert!(!sd.contains(10.5));
    }

    #[test]
    fn test_取走存储() {
        let mut buffer = constant_buffer(1.0, 10, 0.0);
        assert_eq!(buffer.pool_key(), PoolKey::new(2, 1000));
        let samples = buffer.take_samples();
        assert_eq!(samples.len(), 2);
        assert!(buffer.samples.is_empty());
        assert_eq!(buffer.duration(), 0.01);
    }
}
