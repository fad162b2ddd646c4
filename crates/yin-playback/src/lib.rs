//! # yin-playback
//!
//! Yin 的播放调度层.
//!
//! 解码线程把音轨切成定长的 PCM 缓冲, 调度器按音频时钟为缓冲安排起止时间,
//! 实现定位、暂停/恢复、无缝衔接与交叉淡化. 两者之间只传递消息,
//! 缓冲存储随消息转移所有权, 播放完后回到缓冲池.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod fade;
pub mod output;
pub mod pool;
pub mod scheduler;
pub mod track;
pub mod wav;
pub mod worker;

pub use buffer::{DecodedPcmBuffer, SourceDescriptor, SourceId};
pub use clock::{AudioClock, ManualClock, SystemClock};
pub use config::{OutputFormat, PlaybackConfig, ScanPolicyConfig};
pub use fade::{FADE_MINIMUM_VOLUME, GainEnvelope, envelope_at, fade_curve};
pub use output::{AudioOutput, OfflineMixer, OutputEvent, RecordingOutput};
pub use pool::{BufferPool, PlanarStorage, PoolKey, PoolStats};
pub use scheduler::{PlaybackEvent, PlaybackScheduler};
pub use track::{TrackDecoder, TrackInfo, TrackSource};
pub use wav::WavWriter;
pub use worker::{DecodeWorker, FillType, WorkerLink, WorkerRequest, WorkerResponse};
