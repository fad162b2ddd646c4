//! 格式探测.
//!
//! 通过分析文件头部数据和文件扩展名识别容器格式.

use crate::format_id::FormatId;

/// 探测置信度, 数值越高越有把握
pub type ProbeScore = u32;

/// 最低探测分数 (仅根据扩展名)
pub const SCORE_EXTENSION: ProbeScore = 50;

/// 最高探测分数 (魔数完全匹配)
pub const SCORE_MAX: ProbeScore = 100;

/// 探测结果
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// 识别出的格式
    pub format_id: FormatId,
    /// 置信度分数
    pub score: ProbeScore,
}

/// 格式探测器 trait
pub trait FormatProbe {
    /// 根据文件头部数据探测格式
    ///
    /// `data` 为文件开头的若干字节, `filename` 用于扩展名匹配.
    /// 返回 `None` 表示不是此格式.
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore>;

    /// 获取此探测器对应的格式标识
    fn format_id(&self) -> FormatId;
}

/// 文件名扩展名是否属于指定格式
pub(crate) fn extension_matches(filename: Option<&str>, format_id: FormatId) -> bool {
    filename
        .and_then(FormatId::from_filename)
        .is_some_and(|id| id == format_id)
}
