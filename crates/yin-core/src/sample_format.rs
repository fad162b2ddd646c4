//! 音频采样格式定义.
//!
//! 解码器输出只有两种: 带抖动的 16 位整数或 32 位浮点.

use std::fmt;
use std::str::FromStr;

use crate::YinError;

/// 音频采样格式
///
/// - 交错 (Interleaved): 所有声道的采样点交替排列, 如 LRLRLR...
/// - 平面 (Planar): 每个声道独立存储, 如 LLL...RRR...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// 有符号 16 位整数, 交错
    S16,
    /// 32 位浮点, 交错
    F32,
    /// 有符号 16 位整数, 平面
    S16p,
    /// 32 位浮点, 平面
    #[default]
    F32p,
}

impl SampleFormat {
    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> u32 {
        match self {
            Self::S16 | Self::S16p => 2,
            Self::F32 | Self::F32p => 4,
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        matches!(self, Self::S16p | Self::F32p)
    }

    /// 是否为浮点格式
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F32p)
    }

    /// 获取对应的平面格式
    pub const fn to_planar(&self) -> Self {
        match self {
            Self::S16 => Self::S16p,
            Self::F32 => Self::F32p,
            other => *other,
        }
    }

    /// 获取对应的交错格式
    pub const fn to_interleaved(&self) -> Self {
        match self {
            Self::S16p => Self::S16,
            Self::F32p => Self::F32,
            other => *other,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16 => "s16",
            Self::F32 => "flt",
            Self::S16p => "s16p",
            Self::F32p => "fltp",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SampleFormat {
    type Err = YinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s16" => Ok(Self::S16),
            "f32" | "flt" => Ok(Self::F32),
            "s16p" => Ok(Self::S16p),
            "f32p" | "fltp" => Ok(Self::F32p),
            other => Err(YinError::InvalidArgument(format!(
                "未知采样格式: {other}"
            ))),
        }
    }
}
