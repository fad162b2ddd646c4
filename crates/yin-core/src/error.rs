//! 统一错误类型定义.
//!
//! 所有 Yin crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Yin 统一错误类型
#[derive(Debug, Error)]
pub enum YinError {
    /// 探测窗口内找不到可识别的帧, 整条音轨无法播放
    #[error("格式错误: {0}")]
    Format(String),

    /// 帧头同步失败, 通过逐字节重同步在本地恢复
    #[error("帧头同步失败")]
    HeaderSync,

    /// 连续无效帧超过阈值后的致命解码错误
    #[error("解码错误: {0}")]
    Decode(String),

    /// 定位时间超出范围 (会被截断, 不致命)
    #[error("定位超出范围: 请求 {requested:.3}s, 时长 {duration:.3}s")]
    SeekOutOfRange { requested: f64, duration: f64 },

    /// 过期的解码响应, 静默丢弃并回收缓冲
    #[error("过期响应: 代号 {generation}, 当前代号 {current}")]
    StaleResponse { generation: u64, current: u64 },

    /// 缓冲池耗尽, 回退为新分配
    #[error("缓冲池耗尽")]
    PoolExhaustion,

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl YinError {
    /// 是否可在本地恢复 (不向上层报告)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HeaderSync
                | Self::SeekOutOfRange { .. }
                | Self::StaleResponse { .. }
                | Self::PoolExhaustion
        )
    }

    /// 是否为音轨级致命错误 (上层应切换到下一首)
    pub fn is_track_fatal(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Decode(_))
    }
}

/// Yin 统一 Result 类型
pub type YinResult<T> = Result<T, YinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_错误分类_本地恢复() {
        assert!(YinError::HeaderSync.is_recoverable());
        assert!(YinError::PoolExhaustion.is_recoverable());
        assert!(
            YinError::StaleResponse {
                generation: 1,
                current: 2
            }
            .is_recoverable()
        );
        assert!(!YinError::Decode("x".into()).is_recoverable());
    }

    #[test]
    fn test_错误分类_音轨致命() {
        assert!(YinError::Format("无帧".into()).is_track_fatal());
        assert!(YinError::Decode("无效帧过多".into()).is_track_fatal());
        assert!(!YinError::Eof.is_track_fatal());
    }

    #[test]
    fn test_io_错误转换() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: YinError = io.into();
        assert!(matches!(err, YinError::Io(_)));
        assert!(err.to_string().starts_with("I/O 错误"));
    }
}
