//! 容器格式标识符.

use std::fmt;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// 裸 MPEG 音频流 (可带 ID3v2 前缀)
    Mp3,
    /// RIFF WAVE 包装的 Layer III 数据 (格式标签 0x0055)
    RiffMp3,
}

impl FormatId {
    /// 获取格式的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::RiffMp3 => "wav-mp3",
        }
    }

    /// 获取格式常用的文件扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Mp3 => &["mp3", "mp2", "mpga"],
            Self::RiffMp3 => &["wav"],
        }
    }

    /// 所有已知格式标识的列表
    pub const ALL: &[FormatId] = &[Self::Mp3, Self::RiffMp3];

    /// 根据文件扩展名猜测格式
    ///
    /// `ext` 不含 `.`, 大小写不敏感.
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        let ext_lower = ext.to_lowercase();
        Self::ALL
            .iter()
            .find(|id| id.extensions().contains(&ext_lower.as_str()))
            .copied()
    }

    /// 从文件路径猜测格式
    pub fn from_filename(filename: &str) -> Option<FormatId> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
