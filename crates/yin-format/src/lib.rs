//! # yin-format
//!
//! Yin 音频管线解封装库: 数据源 I/O, 格式探测以及 MP3 解封装.
//!
//! MP3 解封装器解析 ID3v2/RIFF 包装与 Xing/VBRI/LAME 侧边头,
//! 得到时长、编码器延迟与填充, 并提供按时间定位到字节偏移的能力.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod probe;
pub mod registry;

// 重导出常用类型
pub use demuxer::{Demuxer, SeekResult};
pub use demuxers::mp3::{DemuxOptions, Mp3Demuxer, Mp3Metadata, ScanPolicy};
pub use format_id::FormatId;
pub use io::{IoContext, SourceKind};
pub use probe::ProbeResult;
pub use registry::FormatRegistry;

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
}
