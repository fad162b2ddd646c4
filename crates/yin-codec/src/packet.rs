//! 压缩数据包 (Packet).
//!
//! 表示从容器中读取的一段压缩数据, 对 MP3 通常是一个完整帧.

use bytes::Bytes;

/// 压缩数据包
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 帧序号 (从 0 开始, 未知时为 -1)
    pub frame_index: i64,
    /// 首个采样在流中的位置 (每声道采样数, 未知时为 -1)
    pub pts: i64,
    /// 包含的采样数 (每声道)
    pub duration: u32,
    /// 在源中的字节偏移量 (-1 表示未知)
    pub pos: i64,
}

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            frame_index: -1,
            pts: -1,
            duration: 0,
            pos: -1,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
