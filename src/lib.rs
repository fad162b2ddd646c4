//! # Yin (音)
//!
//! 纯 Rust 实现的 MP3 解码与无缝播放调度管线.
//!
//! Yin 由以下几层组成:
//! - **解封装**: ID3/RIFF 跳过, Xing/Info/VBRI/LAME 侧边头, 帧同步与定位
//! - **解码**: MPEG-1/2/2.5 Layer III, 比特池, 无缝裁剪
//! - **调度**: 后台解码线程 + 基于音频时钟的缓冲调度, 支持无缝衔接与交叉淡化
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use yin::playback::{PlaybackConfig, TrackDecoder, TrackSource};
//!
//! let config = PlaybackConfig::default();
//! let track = TrackDecoder::open(TrackSource::Path("song.mp3".into()), &config)?;
//! println!("时长: {:.3}s", track.info().duration);
//! # Ok::<(), yin::core::YinError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yin-core` | 错误类型, 位读取器, 时间工具 |
//! | `yin-codec` | MP3 解码器 |
//! | `yin-format` | MP3 解封装与定位 |
//! | `yin-playback` | 解码线程, 缓冲池, 播放调度 |

pub mod logging;

/// 核心类型与工具
pub use yin_core as core;

/// 解码器
pub use yin_codec as codec;

/// 解封装
pub use yin_format as format;

/// 播放调度
pub use yin_playback as playback;

pub use logging::{LoggingConfig, LoggingGuard, init_logging};

/// 获取 Yin 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置解码器的注册表
pub fn default_codec_registry() -> yin_codec::CodecRegistry {
    let mut registry = yin_codec::CodecRegistry::new();
    yin_codec::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置格式的注册表
pub fn default_format_registry() -> yin_format::FormatRegistry {
    let mut registry = yin_format::FormatRegistry::new();
    yin_format::register_all(&mut registry);
    registry
}
