//! # yin-core
//!
//! Yin 音频管线核心库, 提供错误类型、位流读取、VLC 查表和基础音频类型.
//!
//! 解码器、解封装器与播放调度器都建立在本 crate 之上.

pub mod bitreader;
pub mod channel_layout;
pub mod error;
pub mod sample_format;
pub mod time;
pub mod vlc;

// 重导出常用类型
pub use bitreader::BitReader;
pub use channel_layout::ChannelLayout;
pub use error::{YinError, YinResult};
pub use sample_format::SampleFormat;
pub use vlc::VlcTable;
