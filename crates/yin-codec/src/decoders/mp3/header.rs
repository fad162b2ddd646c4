//! MP3 帧头解析

use yin_core::{YinError, YinResult};

use super::tables::{BITRATE_TAB, FREQ_TAB};

/// 帧头字节数
pub const HEADER_SIZE: usize = 4;
/// 单帧最大字节数 (MPEG-2.5 8kHz 160kbps 带填充)
pub const MAX_FRAME_BYTES: usize = 2881;
/// 单声道模式
pub const MODE_MONO: u32 = 3;
/// 联合立体声, 只有该模式下模式扩展有效
pub const MODE_JOINT_STEREO: u32 = 1;

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

/// 快速检查 32 位帧头是否可能有效
///
/// 同步字 11 位全 1, Layer III, 码率索引不为 15, 采样率索引不为 3.
pub fn check_header(header: u32) -> bool {
    (header & 0xffe0_0000) == 0xffe0_0000
        && (header & (3 << 17)) == (1 << 17)
        && (header & (0xf << 12)) != (0xf << 12)
        && (header & (3 << 10)) != (3 << 10)
}

/// 解码后的 Layer III 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Header {
    /// 原始 32 位帧头
    pub raw: u32,
    /// 低采样率扩展 (MPEG-2 / MPEG-2.5)
    pub lsf: bool,
    /// MPEG-2.5
    pub mpeg25: bool,
    /// 采样率索引 (0..9, 已按版本偏移)
    pub sample_rate_index: usize,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 带 CRC 校验
    pub error_protection: bool,
    /// 填充字节 (0 或 1)
    pub padding: u32,
    /// 声道模式原始值 (3 表示单声道)
    pub mode: u32,
    /// 模式扩展 (bit0 强度立体声, bit1 M/S 立体声)
    pub mode_ext: u32,
    /// 声道数
    pub nb_channels: usize,
    /// 码率 (bit/s)
    pub bit_rate: u32,
    /// 帧字节数 (含帧头)
    pub frame_size: usize,
}

impl Mp3Header {
    /// 解析 32 位帧头
    ///
    /// 同步字或字段无效返回 `HeaderSync`; 自由格式 (码率索引 0) 不支持.
    pub fn parse(header: u32) -> YinResult<Self> {
        if !check_header(header) {
            return Err(YinError::HeaderSync);
        }
        Self::decode(header).ok_or_else(|| YinError::Unsupported("MP3 自由格式码率".into()))
    }

    /// 在 `check_header` 通过的前提下解码字段, 自由格式返回 None
    pub fn decode(header: u32) -> Option<Self> {
        let (lsf, mpeg25) = if header & (1 << 20) != 0 {
            (header & (1 << 19) == 0, false)
        } else {
            (true, true)
        };
        let shift = usize::from(lsf) + usize::from(mpeg25);

        let sr_idx = ((header >> 10) & 3) as usize;
        let sample_rate = FREQ_TAB[sr_idx] >> shift;
        let sample_rate_index = sr_idx + 3 * shift;

        let bitrate_index = ((header >> 12) & 0xf) as usize;
        let padding = (header >> 9) & 1;
        let mode = (header >> 6) & 3;
        let mode_ext = if mode == MODE_JOINT_STEREO {
            (header >> 4) & 3
        } else {
            0
        };
        let nb_channels = if mode == MODE_MONO { 1 } else { 2 };

        if bitrate_index == 0 {
            return None;
        }
        let kbps = u32::from(BITRATE_TAB[usize::from(lsf) * 15 + bitrate_index]);
        let frame_size = (kbps * 144_000 / (sample_rate << u32::from(lsf)) + padding) as usize;

        Some(Self {
            raw: header,
            lsf,
            mpeg25,
            sample_rate_index,
            sample_rate,
            error_protection: (header >> 16) & 1 == 0,
            padding,
            mode,
            mode_ext,
            nb_channels,
            bit_rate: kbps * 1000,
            frame_size,
        })
    }

    /// 从 4 字节切片读取并解析
    pub fn from_bytes(bytes: &[u8]) -> YinResult<Self> {
        let raw: [u8; 4] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(YinError::NeedMoreData)?;
        Self::parse(u32::from_be_bytes(raw))
    }

    /// MPEG 版本
    pub fn version(&self) -> MpegVersion {
        match (self.lsf, self.mpeg25) {
            (false, _) => MpegVersion::Mpeg1,
            (true, false) => MpegVersion::Mpeg2,
            (true, true) => MpegVersion::Mpeg25,
        }
    }

    /// 声道模式
    pub fn channel_mode(&self) -> ChannelMode {
        match self.mode {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        }
    }

    /// 每帧采样数 (每声道)
    pub fn samples_per_frame(&self) -> u32 {
        if self.lsf { 576 } else { 1152 }
    }

    /// 侧边信息字节数
    pub fn side_info_size(&self) -> usize {
        match (self.lsf, self.nb_channels) {
            (false, 1) => 17,
            (false, _) => 32,
            (true, 1) => 9,
            (true, _) => 17,
        }
    }
}
