//! 编解码器参数.
//!
//! 描述解码器的配置, 通常由解封装器根据首帧填充.

use yin_core::{ChannelLayout, SampleFormat};

use crate::codec_id::CodecId;

/// 编解码器参数
#[derive(Debug, Clone, PartialEq)]
pub struct CodecParameters {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 码率 (bits/s), 可变码率时为平均值
    pub bit_rate: u64,
    /// 采样率 (Hz), 0 表示未知
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 期望的输出采样格式
    pub sample_format: SampleFormat,
    /// 每帧采样数 (0 表示未知)
    pub frame_size: u32,
    /// 累积输出缓冲时长 (秒), None 使用解码器默认值
    pub buffer_length: Option<f64>,
}

impl CodecParameters {
    /// 仅指定编解码器与输出格式的音频参数
    pub fn audio(codec_id: CodecId, sample_format: SampleFormat) -> Self {
        Self {
            codec_id,
            bit_rate: 0,
            sample_rate: 0,
            channel_layout: ChannelLayout::STEREO,
            sample_format,
            frame_size: 0,
            buffer_length: None,
        }
    }
}

impl Default for CodecParameters {
    fn default() -> Self {
        Self::audio(CodecId::None, SampleFormat::default())
    }
}
