//! 播放配置.
//!
//! 所有字段都有默认值, 可以从 JSON 文件只覆盖其中一部分.

use std::path::Path;

use serde::{Deserialize, Serialize};
use yin_codec::decoders::mp3::clamp_buffer_length;
use yin_core::{SampleFormat, YinError, YinResult};
use yin_format::ScanPolicy;

/// 解码输出的样本格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16 位整数 (带抖动), 交给调度器前转换为浮点
    S16,
    #[default]
    F32,
}

impl OutputFormat {
    /// 对应的解码器平面格式
    pub fn sample_format(self) -> SampleFormat {
        match self {
            Self::S16 => SampleFormat::S16p,
            Self::F32 => SampleFormat::F32p,
        }
    }
}

/// 帧扫描预算 (字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScanPolicyConfig {
    #[serde(default = "default_local_budget")]
    pub local_budget: u64,
    #[serde(default = "default_network_budget")]
    pub network_budget: u64,
}

impl Default for ScanPolicyConfig {
    fn default() -> Self {
        Self {
            local_budget: default_local_budget(),
            network_budget: default_network_budget(),
        }
    }
}

impl From<ScanPolicyConfig> for ScanPolicy {
    fn from(config: ScanPolicyConfig) -> Self {
        ScanPolicy {
            local_budget: config.local_budget,
            network_budget: config.network_budget,
        }
    }
}

fn default_local_budget() -> u64 {
    ScanPolicy::default().local_budget
}

fn default_network_budget() -> u64 {
    ScanPolicy::default().network_budget
}

/// 播放配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// 每个解码缓冲的时长 (秒)
    #[serde(default = "default_buffer_time")]
    pub buffer_time: f64,
    /// 保持在队列中的已解码音频时长 (秒)
    #[serde(default = "default_sustained_seconds")]
    pub sustained_buffered_audio_seconds: f64,
    #[serde(default = "default_min_buffers_to_request")]
    pub min_buffers_to_request: usize,
    #[serde(default = "default_max_buffers_in_flight")]
    pub max_buffers_in_flight: usize,
    /// 新音源相对当前时钟的最小提前量 (秒)
    #[serde(default = "default_schedule_ahead_time")]
    pub schedule_ahead_time: f64,
    /// 交叉淡化时长, 0 表示无缝衔接
    #[serde(default)]
    pub crossfade_duration: f64,
    #[serde(default = "default_fade_time")]
    pub seek_fade_time: f64,
    #[serde(default = "default_fade_time")]
    pub track_change_fade_time: f64,
    #[serde(default = "default_fade_time")]
    pub pause_resume_fade_time: f64,
    #[serde(default = "default_fade_time")]
    pub mute_unmute_fade_time: f64,
    /// 已播放缓冲的保留数量 (供可视化取样)
    #[serde(default = "default_played_buffers_retained")]
    pub played_buffers_retained: usize,
    /// 缓冲池每个键保留的存储块数量
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub scan_policy: ScanPolicyConfig,
    /// 替换解码器固有延迟 (529 样本)
    #[serde(default)]
    pub decoder_delay_override: Option<u32>,
    /// 替换最短可播放时长 (默认 3 秒)
    #[serde(default)]
    pub minimum_track_duration: Option<f64>,
}

fn default_buffer_time() -> f64 {
    2.0
}

fn default_sustained_seconds() -> f64 {
    6.0
}

fn default_min_buffers_to_request() -> usize {
    1
}

fn default_max_buffers_in_flight() -> usize {
    4
}

fn default_schedule_ahead_time() -> f64 {
    0.05
}

fn default_fade_time() -> f64 {
    0.2
}

fn default_played_buffers_retained() -> usize {
    4
}

fn default_pool_capacity() -> usize {
    16
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_time: default_buffer_time(),
            sustained_buffered_audio_seconds: default_sustained_seconds(),
            min_buffers_to_request: default_min_buffers_to_request(),
            max_buffers_in_flight: default_max_buffers_in_flight(),
            schedule_ahead_time: default_schedule_ahead_time(),
            crossfade_duration: 0.0,
            seek_fade_time: default_fade_time(),
            track_change_fade_time: default_fade_time(),
            pause_resume_fade_time: default_fade_time(),
            mute_unmute_fade_time: default_fade_time(),
            played_buffers_retained: default_played_buffers_retained(),
            pool_capacity: default_pool_capacity(),
            output_format: OutputFormat::default(),
            scan_policy: ScanPolicyConfig::default(),
            decoder_delay_override: None,
            minimum_track_duration: None,
        }
    }
}

impl PlaybackConfig {
    /// 从 JSON 文件读取并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> YinResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// 从 JSON 文本读取并校验
    pub fn from_json_str(text: &str) -> YinResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| YinError::InvalidArgument(format!("播放配置解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 拒绝负数与非有限值
    pub fn validate(&self) -> YinResult<()> {
        let seconds = [
            ("buffer_time", self.buffer_time),
            (
                "sustained_buffered_audio_seconds",
                self.sustained_buffered_audio_seconds,
            ),
            ("schedule_ahead_time", self.schedule_ahead_time),
            ("crossfade_duration", self.crossfade_duration),
            ("seek_fade_time", self.seek_fade_time),
            ("track_change_fade_time", self.track_change_fade_time),
            ("pause_resume_fade_time", self.pause_resume_fade_time),
            ("mute_unmute_fade_time", self.mute_unmute_fade_time),
        ];
        for (name, value) in seconds {
            if !value.is_finite() || value < 0.0 {
                return Err(YinError::InvalidArgument(format!(
                    "{name} 必须是非负有限值, 实际为 {value}"
                )));
            }
        }
        if let Some(d) = self.minimum_track_duration.filter(|d| !d.is_finite() || *d < 0.0) {
            return Err(YinError::InvalidArgument(format!(
                "minimum_track_duration 必须是非负有限值, 实际为 {d}"
            )));
        }
        if self.buffer_time == 0.0 {
            return Err(YinError::InvalidArgument("buffer_time 不能为 0".into()));
        }
        if self.max_buffers_in_flight == 0 {
            return Err(YinError::InvalidArgument(
                "max_buffers_in_flight 不能为 0".into(),
            ));
        }
        Ok(())
    }

    /// 截断到允许范围后的缓冲时长
    pub fn buffer_time(&self) -> f64 {
        clamp_buffer_length(self.buffer_time).unwrap_or_else(default_buffer_time)
    }

    /// 持续保持的缓冲数量
    pub fn sustained_buffer_count(&self) -> usize {
        let count = (self.sustained_buffered_audio_seconds / self.buffer_time()).ceil();
        (count as usize).max(1)
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        self.scan_policy.into()
    }
}
