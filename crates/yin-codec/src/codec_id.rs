//! 编解码器标识符.
//!
//! 管线只解码 MPEG Layer III, 其它 MPEG 音频层在探测阶段被识别后拒绝.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    #[default]
    None,
    /// MP3 (MPEG Audio Layer III)
    Mp3,
    /// MP2 (MPEG Audio Layer II), 仅用于探测结果
    Mp2,
}

impl CodecId {
    /// 获取编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mp3 => "mp3",
            Self::Mp2 => "mp2",
        }
    }

    /// 是否有内置解码器
    pub const fn is_decodable(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
