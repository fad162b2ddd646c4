//! MP3 (MPEG Audio Layer III) 解封装器.
//!
//! 支持裸 MPEG 音频流 (可带 ID3v2 前缀) 与 RIFF/WAVE 包装的 Layer III 数据.
//! 每个数据包是一个完整的音频帧 (含帧头), 位存储器的跨帧依赖留给解码器处理.

mod metadata;
mod seek_table;
mod seeker;
mod sync;

use bytes::Bytes;
use log::{debug, trace};
use yin_codec::decoders::mp3::check_header;
use yin_codec::{CodecId, CodecParameters, Mp3Header, Packet};
use yin_core::{ChannelLayout, SampleFormat, YinError, YinResult};

use crate::demuxer::{Demuxer, SeekResult};
use crate::format_id::FormatId;
use crate::io::{BlockCache, IoContext};
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX, extension_matches};

pub use crate::io::SourceKind;
pub use metadata::{
    DEFAULT_ENCODER_DELAY, FULL_SCAN_HORIZON, MINIMUM_DURATION, Mp3Metadata, ScanPolicy,
    SideHeader, VBRI_DELAY, VbriHeader, XingHeader, demux,
};
pub use seek_table::{Mp3SeekTable, StreamLayout};
pub use seeker::RESERVOIR_WARMUP_FRAMES;

use sync::{confirmed_header, header_at};

/// 解封装选项
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DemuxOptions {
    /// 帧扫描的字节预算
    pub scan_policy: ScanPolicy,
    /// 可接受的最短时长 (秒), None 使用 [`MINIMUM_DURATION`]
    pub minimum_duration: Option<f64>,
    /// 不为 VBR 流建立定位表 (时长改按 CBR 估算)
    pub no_seek_table: bool,
}

/// MP3 解封装器
pub struct Mp3Demuxer {
    /// 格式标识 (裸流或 RIFF 包装)
    format_id: FormatId,
    options: DemuxOptions,
    metadata: Option<Mp3Metadata>,
    /// 下一个包的字节偏移
    position: u64,
    /// 下一个包的帧序号
    frame_index: u64,
    /// 上一个包恰好结束于 `position`
    synced: bool,
    cache: BlockCache,
}

impl Mp3Demuxer {
    /// 创建裸 MP3 流的解封装器实例 (工厂函数)
    pub fn create() -> YinResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::with_options(DemuxOptions::default())))
    }

    /// 创建 RIFF 包装流的解封装器实例 (工厂函数)
    pub fn create_riff() -> YinResult<Box<dyn Demuxer>> {
        let mut demuxer = Self::with_options(DemuxOptions::default());
        demuxer.format_id = FormatId::RiffMp3;
        Ok(Box::new(demuxer))
    }

    /// 使用指定选项创建
    pub fn with_options(options: DemuxOptions) -> Self {
        Self {
            format_id: FormatId::Mp3,
            options,
            metadata: None,
            position: 0,
            frame_index: 0,
            synced: false,
            cache: BlockCache::default(),
        }
    }

    fn opened(&self) -> YinResult<&Mp3Metadata> {
        self.metadata
            .as_ref()
            .ok_or_else(|| YinError::InvalidArgument("MP3: 解封装器尚未打开".into()))
    }
}

impl Demuxer for Mp3Demuxer {
    fn format_id(&self) -> FormatId {
        self.format_id
    }

    fn name(&self) -> &str {
        self.format_id.name()
    }

    fn open(&mut self, io: &mut IoContext) -> YinResult<()> {
        let metadata = demux(io, &self.options)?;
        if metadata.is_riff {
            self.format_id = FormatId::RiffMp3;
        }
        self.position = metadata.data_start;
        self.frame_index = 0;
        self.synced = false;
        self.cache.invalidate();
        self.metadata = Some(metadata);
        Ok(())
    }

    fn metadata(&self) -> Option<&Mp3Metadata> {
        self.metadata.as_ref()
    }

    fn codec_parameters(&self) -> Option<CodecParameters> {
        let meta = self.metadata.as_ref()?;
        Some(CodecParameters {
            codec_id: CodecId::Mp3,
            bit_rate: if meta.vbr && meta.duration > 0.0 {
                (meta.data_end.saturating_sub(meta.data_start) as f64 * 8.0 / meta.duration) as u64
            } else {
                u64::from(meta.bit_rate)
            },
            sample_rate: meta.sample_rate,
            channel_layout: ChannelLayout::from_channels(meta.channels),
            sample_format: SampleFormat::F32,
            frame_size: meta.samples_per_frame,
            buffer_length: None,
        })
    }

    fn read_packet(&mut self, io: &mut IoContext) -> YinResult<Packet> {
        let data_end = self.opened()?.data_end;
        let mut pos = self.position;

        let header = loop {
            if pos.saturating_add(4) > data_end {
                self.position = pos;
                return Err(YinError::Eof);
            }
            // 紧接上一帧时不需要前瞻; 失步后必须确认下一帧
            let found = if self.synced {
                header_at(&mut self.cache, io, pos)?
                    .filter(|h| pos + h.frame_size as u64 <= data_end)
            } else {
                confirmed_header(&mut self.cache, io, pos, data_end)?
            };
            match found {
                Some(header) => break header,
                None => {
                    if self.synced {
                        trace!("MP3: 偏移 {pos} 处失步, 重新同步");
                        self.synced = false;
                    }
                    pos += 1;
                }
            }
        };

        let size = header.frame_size;
        let data = self.cache.bytes_at(io, pos, size)?;
        if data.len() < size {
            self.position = pos;
            return Err(YinError::Eof);
        }

        let spf = i64::from(header.samples_per_frame());
        let packet = Packet {
            data: Bytes::copy_from_slice(data),
            frame_index: self.frame_index as i64,
            pts: self.frame_index as i64 * spf,
            duration: header.samples_per_frame(),
            pos: pos as i64,
        };
        self.position = pos + size as u64;
        self.frame_index += 1;
        self.synced = true;
        Ok(packet)
    }

    fn seek(&mut self, io: &mut IoContext, time: f64) -> YinResult<SeekResult> {
        let meta = self
            .metadata
            .as_mut()
            .ok_or_else(|| YinError::InvalidArgument("MP3: 解封装器尚未打开".into()))?;
        let result = seeker::seek(meta, time, io)?;
        self.position = result.offset;
        self.frame_index = result.frame;
        self.synced = false;
        debug!(
            "MP3: seek {time:.3}s -> 偏移 {}, 帧 {}",
            result.offset, result.frame
        );
        Ok(result)
    }

    fn duration(&self) -> Option<f64> {
        self.metadata
            .as_ref()
            .map(|m| m.duration)
            .filter(|d| *d > 0.0)
    }
}

/// 跳过 `data` 开头的 ID3v2 标签, 返回标签后的偏移
fn id3v2_end(data: &[u8]) -> usize {
    let mut start = 0usize;
    while data.len() >= start + 10 && &data[start..start + 3] == b"ID3" {
        let size = data[start + 6..start + 10]
            .iter()
            .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7F));
        let footer = if data[start + 5] & 0x10 != 0 { 10 } else { 0 };
        start += 10 + size + footer;
    }
    start
}

fn be_u32_at(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// MP3 格式探测器
pub struct Mp3Probe;

impl FormatProbe for Mp3Probe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        let start = id3v2_end(data);
        if start >= data.len() && start > 0 {
            // 标签 (常见于内嵌封面) 比探测数据更长
            return Some(SCORE_EXTENSION + 10);
        }
        if let Some(header) = be_u32_at(data, start)
            .filter(|&w| check_header(w))
            .and_then(Mp3Header::decode)
        {
            // 下一帧在探测数据内时也要求同步
            let next = start + header.frame_size;
            let follows = be_u32_at(data, next).is_none_or(check_header);
            if follows {
                return Some(SCORE_MAX - 5);
            }
        }

        extension_matches(filename, FormatId::Mp3).then_some(SCORE_EXTENSION)
    }

    fn format_id(&self) -> FormatId {
        FormatId::Mp3
    }
}

/// RIFF/WAVE 包装的 Layer III 探测器
pub struct RiffMp3Probe;

impl FormatProbe for RiffMp3Probe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        let start = id3v2_end(data);
        let riff = data.get(start..start + 12)?;
        if &riff[..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
            return None;
        }
        // 逐块查找 fmt, 格式标签必须是 0x0055
        let mut pos = start + 12;
        while let Some(chunk) = data.get(pos..pos + 8) {
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as usize;
            if &chunk[..4] == b"fmt " {
                let tag = data.get(pos + 8..pos + 10)?;
                return (u16::from_le_bytes([tag[0], tag[1]]) == 0x0055).then_some(SCORE_MAX);
            }
            pos = pos.checked_add(8 + size + (size & 1))?;
        }
        extension_matches(filename, FormatId::RiffMp3).then_some(SCORE_EXTENSION)
    }

    fn format_id(&self) -> FormatId {
        FormatId::RiffMp3
    }
}
