//! MP3 流元数据解析.
//!
//! 文件结构:
//! ```text
//! [ID3v2 标签 (可重复, 可选)]
//! [RIFF/WAVE 包装 (可选, fmt 格式标签 0x0055)]
//! [第一帧: 可能携带 Xing/Info (+LAME) 或 VBRI 头]
//! [MPEG 音频帧 ...]
//! ```
//!
//! 时长按以下顺序确定: 侧边头中的帧数, RIFF 的 `fact`/`data` 块,
//! CBR 按字节数估算, 最后才逐帧扫描整个 VBR 流.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use log::{debug, warn};
use yin_codec::decoders::mp3::{DECODER_DELAY, MAX_FRAME_BYTES, Mp3Header};
use yin_core::{YinError, YinResult};

use super::seek_table::{Mp3SeekTable, StreamLayout};
use super::sync::{confirmed_header, header_at};
use super::{DemuxOptions, SourceKind};
use crate::io::{BlockCache, IoContext};

/// 短于此时长 (秒) 的流不值得解码
pub const MINIMUM_DURATION: f64 = 3.0;
/// 没有侧边头时假定的编码器延迟 (样本)
pub const DEFAULT_ENCODER_DELAY: u32 = 576;
/// VBRI 编码器的经验延迟 (样本)
pub const VBRI_DELAY: u32 = 1159;
/// 全量扫描 VBR 流时的时间上限 (秒)
pub const FULL_SCAN_HORIZON: f64 = 30.0 * 60.0;
/// LAME 延迟/填充字段的合理上限
const MAX_GAPLESS_SAMPLES: u32 = 2880;
/// 首帧之后最多检查的帧头数
const MAX_PROBED_HEADERS: u32 = 5;

const TAG_ID3: &[u8; 3] = b"ID3";
const TAG_RIFF: &[u8; 4] = b"RIFF";
const TAG_WAVE: &[u8; 4] = b"WAVE";
const TAG_XING: &[u8; 4] = b"Xing";
const TAG_INFO: &[u8; 4] = b"Info";
const TAG_VBRI: &[u8; 4] = b"VBRI";
/// LAME 扩展头的编码器前缀 (libavcodec/libavformat 编码的文件遵循相同布局)
const ENCODER_TAGS: [&[u8; 4]; 3] = [b"LAME", b"Lavc", b"Lavf"];
/// WAVE 格式标签: MPEG Layer III
const WAVE_FORMAT_MPEGLAYER3: u16 = 0x0055;

/// 帧扫描的字节预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    /// 本地文件的预算
    pub local_budget: u64,
    /// 网络流的预算
    pub network_budget: u64,
}

impl ScanPolicy {
    /// 指定数据源的预算
    pub fn budget(&self, kind: SourceKind) -> u64 {
        match kind {
            SourceKind::Local => self.local_budget,
            SourceKind::Network => self.network_budget,
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            local_budget: 5 * 1024 * 1024,
            network_budget: 50 * 1024,
        }
    }
}

/// VBRI 头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbriHeader {
    pub version: u16,
    pub delay: u16,
    pub quality: u16,
    /// 流总字节数
    pub bytes: u32,
    /// 流总帧数
    pub frames: u32,
    /// 目录条目数
    pub toc_entries: u16,
    /// 目录值的缩放因子
    pub scale: u16,
    /// 每个条目的字节数 (1..=4)
    pub entry_size: u16,
    /// 每个条目覆盖的帧数
    pub frames_per_entry: u16,
}

/// Xing/Info 头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XingHeader {
    /// `Info` 标签 (CBR 编码器写入)
    pub is_info: bool,
    /// 标志位: 1 帧数, 2 字节数, 4 目录, 8 质量
    pub flags: u32,
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    /// 编码器版本字符串 (LAME 扩展)
    pub encoder: Option<String>,
}

/// 第一帧中的侧边头
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SideHeader {
    #[default]
    None,
    Xing(XingHeader),
    Vbri(VbriHeader),
}

/// 解封装结果
#[derive(Debug, Clone, PartialEq)]
pub struct Mp3Metadata {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// 码率 (bit/s), VBR 时为首帧码率
    pub bit_rate: u32,
    /// 低采样率扩展 (MPEG-2/2.5)
    pub lsf: bool,
    /// 音频帧数
    pub frames: u64,
    /// 每帧采样数
    pub samples_per_frame: u32,
    /// 时长 (秒)
    pub duration: f64,
    /// 第一个音频帧的偏移
    pub data_start: u64,
    /// 音频数据结束偏移
    pub data_end: u64,
    /// 平均帧字节数
    pub average_frame_size: f64,
    /// 编码器延迟 (样本)
    pub encoder_delay: u32,
    /// 扣除解码器延迟后需要在末尾裁掉的样本数
    pub encoder_padding: u32,
    /// 开始裁剪尾部填充的帧 (从 0 计)
    pub padding_start_frame: Option<u64>,
    /// 单帧最大字节数
    pub max_byte_size_per_audio_frame: usize,
    /// Xing 目录: 100 个百分位对应的字节位置 (/256)
    pub toc: Option<[u8; 100]>,
    pub seek_table: Option<Mp3SeekTable>,
    /// 可变码率
    pub vbr: bool,
    /// Xing 质量字段
    pub lame_quality: Option<u32>,
    /// 来自 RIFF/WAVE 包装
    pub is_riff: bool,
    pub side_header: SideHeader,
}

impl Mp3Metadata {
    /// 帧数来自 Xing/Info/VBRI 头, 而不是按字节数估算
    pub fn frame_count_is_exact(&self) -> bool {
        match &self.side_header {
            SideHeader::Xing(xing) => xing.frames.is_some(),
            SideHeader::Vbri(_) => true,
            SideHeader::None => false,
        }
    }

    /// 由首个有效帧头建立默认元数据
    fn from_first_header(header: &Mp3Header, offset: u64, data_end: u64) -> Self {
        Self {
            sample_rate: header.sample_rate,
            channels: header.nb_channels as u32,
            bit_rate: header.bit_rate,
            lsf: header.lsf,
            frames: 0,
            samples_per_frame: header.samples_per_frame(),
            duration: 0.0,
            data_start: offset,
            data_end,
            average_frame_size: f64::from(header.bit_rate / 1000) * 144_000.0
                / f64::from(header.sample_rate << u32::from(header.lsf)),
            encoder_delay: DEFAULT_ENCODER_DELAY,
            encoder_padding: 0,
            padding_start_frame: None,
            max_byte_size_per_audio_frame: MAX_FRAME_BYTES,
            toc: None,
            seek_table: None,
            vbr: false,
            lame_quality: None,
            is_riff: false,
            side_header: SideHeader::None,
        }
    }

    /// 定位表扫描所需的流参数
    pub fn layout(&self) -> StreamLayout {
        StreamLayout {
            data_start: self.data_start,
            data_end: self.data_end,
            sample_rate: self.sample_rate,
            samples_per_frame: self.samples_per_frame,
        }
    }

    /// 第 `frame` 帧的起始时间 (秒)
    pub fn frame_time(&self, frame: u64) -> f64 {
        self.layout().frames_to_seconds(frame)
    }

    /// 尾部填充所在帧, 以及该帧需要丢弃的样本数
    pub fn padding_trim(&self) -> Option<(u64, u32)> {
        let frame = self.padding_start_frame?;
        let after = self.frames.saturating_sub(frame + 1) * u64::from(self.samples_per_frame);
        let trim = u64::from(self.encoder_padding).saturating_sub(after);
        Some((frame, trim.min(u64::from(self.samples_per_frame)) as u32))
    }

    /// 根据 LAME 填充计算裁剪起点
    fn set_padding(&mut self, padding: u32) {
        let padding = padding.saturating_sub(DECODER_DELAY);
        let total = self.frames * u64::from(self.samples_per_frame);
        if padding == 0 || total <= u64::from(padding) {
            return;
        }
        let end = total - u64::from(padding);
        self.padding_start_frame = Some((end - 1) / u64::from(self.samples_per_frame));
        self.encoder_padding = padding;
    }
}

/// 解析 MP3 流, 得到元数据
pub fn demux(io: &mut IoContext, options: &DemuxOptions) -> YinResult<Mp3Metadata> {
    let file_size = io.size().unwrap_or(u64::MAX);
    let mut cache = BlockCache::default();

    let start = skip_id3v2(&mut cache, io)?;
    if start > 0 {
        debug!("MP3: 跳过 ID3v2 标签, 共 {start} 字节");
    }

    let head = cache.bytes_at(io, start, 12)?;
    let mut metadata = if head.len() == 12 && &head[..4] == TAG_RIFF && &head[8..12] == TAG_WAVE {
        parse_riff(&mut cache, io, start, file_size)?
    } else {
        let budget = options.scan_policy.budget(io.source_kind());
        scan_frames(&mut cache, io, start, file_size, budget)?
    };

    if metadata.duration <= 0.0 {
        estimate_duration(&mut metadata, io, options)?;
    }

    let minimum = options.minimum_duration.unwrap_or(MINIMUM_DURATION);
    if metadata.duration < minimum {
        return Err(YinError::Format(format!(
            "MP3: 时长 {:.3}s 短于下限 {minimum:.3}s",
            metadata.duration
        )));
    }

    debug!(
        "MP3: {}Hz {}ch {}kbps, {} 帧, {:.3}s, vbr={}, delay={}, padding={}",
        metadata.sample_rate,
        metadata.channels,
        metadata.bit_rate / 1000,
        metadata.frames,
        metadata.duration,
        metadata.vbr,
        metadata.encoder_delay,
        metadata.encoder_padding,
    );
    Ok(metadata)
}

/// 跳过开头的 ID3v2 标签 (可能重复出现), 返回第一个非标签字节的偏移
fn skip_id3v2(cache: &mut BlockCache, io: &mut IoContext) -> YinResult<u64> {
    let mut offset = 0u64;
    loop {
        let head = cache.bytes_at(io, offset, 10)?;
        if head.len() < 10 || &head[..3] != TAG_ID3 {
            return Ok(offset);
        }
        // syncsafe 整数, 每字节只用低 7 位
        let size = head[6..10]
            .iter()
            .fold(0u64, |acc, &b| (acc << 7) | u64::from(b & 0x7F));
        let footer = if head[5] & 0x10 != 0 { 10 } else { 0 };
        offset += 10 + size + footer;
    }
}

/// 解析 RIFF/WAVE 包装
fn parse_riff(
    cache: &mut BlockCache,
    io: &mut IoContext,
    offset: u64,
    file_size: u64,
) -> YinResult<Mp3Metadata> {
    let riff_size = u64::from(le_u32(cache.bytes_at(io, offset + 4, 4)?).unwrap_or(0));
    let riff_end = (offset + 8 + riff_size).min(file_size);

    let mut fmt: Option<WaveFormat> = None;
    let mut fact_samples: Option<u32> = None;
    let mut pos = offset + 12;

    while pos + 8 <= riff_end {
        let chunk = cache.bytes_at(io, pos, 8)?;
        if chunk.len() < 8 {
            break;
        }
        let tag: [u8; 4] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let size = u64::from(LittleEndian::read_u32(&chunk[4..8]));
        let body = pos + 8;

        match &tag {
            b"fmt " => {
                let bytes = cache.bytes_at(io, body, size.min(64) as usize)?;
                fmt = Some(WaveFormat::parse(bytes).ok_or_else(|| {
                    YinError::Format("RIFF: fmt 块不是有效的 MPEG Layer III 格式".into())
                })?);
            }
            b"fact" => {
                let bytes = cache.bytes_at(io, body, 4)?;
                fact_samples = le_u32(bytes);
            }
            b"data" => {
                let format = fmt
                    .ok_or_else(|| YinError::Format("RIFF: data 块之前没有 fmt 块".into()))?;
                // 流式写入的文件 data 大小可能为 0 或全 1
                let data_end = if size == 0 || size == u64::from(u32::MAX) {
                    riff_end
                } else {
                    (body + size).min(file_size)
                };
                return Ok(format.into_metadata(body, data_end, fact_samples));
            }
            _ => {}
        }
        // 块大小按 2 字节对齐
        pos = body + size + (size & 1);
    }
    Err(YinError::Format("RIFF: 未找到 data 块".into()))
}

/// `fmt ` 块中与 Layer III 相关的字段
#[derive(Debug, Clone, Copy)]
struct WaveFormat {
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_size: u16,
    codec_delay: u16,
}

impl WaveFormat {
    /// 解析 MPEGLAYER3WAVEFORMAT, 格式标签不是 Layer III 时返回 None
    fn parse(bytes: &[u8]) -> Option<Self> {
        let mut r = Cursor::new(bytes);
        let tag = r.read_u16::<LittleEndian>().ok()?;
        if tag != WAVE_FORMAT_MPEGLAYER3 {
            warn!("RIFF: 格式标签 {tag:#06x} 不是 MPEG Layer III");
            return None;
        }
        let channels = r.read_u16::<LittleEndian>().ok()?;
        let sample_rate = r.read_u32::<LittleEndian>().ok()?;
        let byte_rate = r.read_u32::<LittleEndian>().ok()?;
        // block_align, bits_per_sample, cb_size, w_id, fdw_flags
        r.set_position(24);
        let block_size = r.read_u16::<LittleEndian>().unwrap_or(0);
        let _frames_per_block = r.read_u16::<LittleEndian>().unwrap_or(1);
        let codec_delay = r.read_u16::<LittleEndian>().unwrap_or(0);
        (channels > 0 && sample_rate > 0 && byte_rate > 0).then_some(Self {
            channels,
            sample_rate,
            byte_rate,
            block_size,
            codec_delay,
        })
    }

    fn into_metadata(self, data_start: u64, data_end: u64, fact_samples: Option<u32>) -> Mp3Metadata {
        let lsf = self.sample_rate < 32_000;
        let samples_per_frame: u32 = if lsf { 576 } else { 1152 };
        let sample_rate = f64::from(self.sample_rate);
        let (duration, frames) = match fact_samples {
            Some(samples) if samples > 0 => (
                f64::from(samples) / sample_rate,
                u64::from(samples / samples_per_frame),
            ),
            _ => {
                let duration = data_end.saturating_sub(data_start) as f64 / f64::from(self.byte_rate);
                (duration, (duration * sample_rate / f64::from(samples_per_frame)) as u64)
            }
        };
        let average_frame_size = if self.block_size > 0 {
            f64::from(self.block_size)
        } else {
            f64::from(self.byte_rate) * f64::from(samples_per_frame) / sample_rate
        };
        debug!("MP3: RIFF/WAVE 包装, {} 字节数据", data_end.saturating_sub(data_start));
        Mp3Metadata {
            sample_rate: self.sample_rate,
            channels: u32::from(self.channels),
            bit_rate: self.byte_rate * 8,
            lsf,
            frames,
            samples_per_frame,
            duration,
            data_start,
            data_end,
            average_frame_size,
            encoder_delay: u32::from(self.codec_delay),
            encoder_padding: 0,
            padding_start_frame: None,
            max_byte_size_per_audio_frame: MAX_FRAME_BYTES,
            toc: None,
            seek_table: None,
            vbr: false,
            lame_quality: None,
            is_riff: true,
            side_header: SideHeader::None,
        }
    }
}

/// 在预算内扫描帧头, 建立元数据并解析第一帧中的侧边头
fn scan_frames(
    cache: &mut BlockCache,
    io: &mut IoContext,
    start: u64,
    data_end: u64,
    budget: u64,
) -> YinResult<Mp3Metadata> {
    let scan_end = start.saturating_add(budget).min(data_end);
    let mut pos = start;
    let mut metadata: Option<Mp3Metadata> = None;
    let mut headers_found = 0u32;

    while pos < scan_end && headers_found < MAX_PROBED_HEADERS {
        if metadata.is_none() {
            // 首帧: 下一帧同步字有效, 或者 +36 处是 VBRI
            let Some(header) = first_frame_at(cache, io, pos, data_end)? else {
                pos += 1;
                continue;
            };
            let mut meta = Mp3Metadata::from_first_header(&header, pos, data_end);
            if parse_side_header(cache, io, &mut meta, &header, pos)? {
                return Ok(meta);
            }
            headers_found = 1;
            pos += header.frame_size as u64;
            metadata = Some(meta);
            continue;
        }

        match confirmed_header(cache, io, pos, data_end)? {
            Some(header) => {
                headers_found += 1;
                if let Some(meta) = metadata.as_mut() {
                    if header.bit_rate != meta.bit_rate && !meta.vbr {
                        debug!(
                            "MP3: 码率变化 {} -> {}, 按 VBR 处理",
                            meta.bit_rate, header.bit_rate
                        );
                        meta.vbr = true;
                    }
                }
                pos += header.frame_size as u64;
            }
            None => pos += 1,
        }
    }

    metadata.ok_or_else(|| {
        YinError::Format(format!(
            "MP3: 在 {} 字节内未找到有效的 MPEG 音频帧",
            scan_end.saturating_sub(start)
        ))
    })
}

/// 首帧的接受条件比普通帧宽松: 允许下一帧无效但带有 VBRI 头
fn first_frame_at(
    cache: &mut BlockCache,
    io: &mut IoContext,
    pos: u64,
    data_end: u64,
) -> YinResult<Option<Mp3Header>> {
    if let Some(header) = confirmed_header(cache, io, pos, data_end)? {
        return Ok(Some(header));
    }
    let Some(header) = header_at(cache, io, pos)? else {
        return Ok(None);
    };
    let vbri = cache.bytes_at(io, pos + 36, 4)? == TAG_VBRI;
    Ok(vbri.then_some(header))
}

/// 解析首帧中的 Xing/Info 或 VBRI 头, 找到时返回 true
fn parse_side_header(
    cache: &mut BlockCache,
    io: &mut IoContext,
    meta: &mut Mp3Metadata,
    header: &Mp3Header,
    frame_offset: u64,
) -> YinResult<bool> {
    let xing_pos = frame_offset + 4 + header.side_info_size() as u64;
    let xing_tag = cache.bytes_at(io, xing_pos, 4)?;
    if xing_tag == TAG_XING || xing_tag == TAG_INFO {
        let bytes = cache.bytes_at(io, xing_pos, 160)?.to_vec();
        parse_xing(meta, &bytes);
        meta.data_start = frame_offset + header.frame_size as u64;
        return Ok(true);
    }

    let vbri_pos = frame_offset + 36;
    if cache.bytes_at(io, vbri_pos, 4)? == TAG_VBRI {
        let head = cache.bytes_at(io, vbri_pos, 26)?.to_vec();
        let Some(vbri) = parse_vbri_header(&head) else {
            return Ok(false);
        };
        meta.data_start = frame_offset + header.frame_size as u64;
        let toc_pos = vbri_pos + 26;
        let toc = if (1..=4).contains(&vbri.entry_size) {
            let toc_len = (u64::from(vbri.toc_entries) * u64::from(vbri.entry_size))
                .min(meta.data_end.saturating_sub(toc_pos));
            cache.bytes_at(io, toc_pos, toc_len as usize)?.to_vec()
        } else {
            Vec::new()
        };
        apply_vbri(meta, vbri, &toc);
        return Ok(true);
    }
    Ok(false)
}

/// 解析 Xing/Info 头与其后的 LAME 扩展
///
/// `bytes` 从标签开始, 截断时缺失的字段保持默认.
fn parse_xing(meta: &mut Mp3Metadata, bytes: &[u8]) {
    let is_info = &bytes[..4] == TAG_INFO;
    meta.vbr = !is_info;
    let mut r = Cursor::new(bytes);
    r.set_position(4);
    let Ok(flags) = r.read_u32::<BigEndian>() else {
        meta.side_header = SideHeader::Xing(XingHeader {
            is_info,
            flags: 0,
            frames: None,
            bytes: None,
            encoder: None,
        });
        return;
    };

    let mut xing = XingHeader {
        is_info,
        flags,
        frames: None,
        bytes: None,
        encoder: None,
    };
    if flags & 0x1 != 0 {
        xing.frames = r.read_u32::<BigEndian>().ok();
    }
    if flags & 0x2 != 0 {
        xing.bytes = r.read_u32::<BigEndian>().ok();
    }
    if flags & 0x4 != 0 {
        let mut toc = [0u8; 100];
        if std::io::Read::read_exact(&mut r, &mut toc).is_ok() {
            meta.toc = Some(toc);
        }
    }
    if flags & 0x8 != 0 {
        meta.lame_quality = r.read_u32::<BigEndian>().ok();
    }

    if let Some(frames) = xing.frames {
        meta.frames = u64::from(frames);
        meta.duration = meta.frame_time(meta.frames);
        if let Some(bytes) = xing.bytes.filter(|_| frames > 0) {
            meta.average_frame_size = f64::from(bytes) / f64::from(frames);
        }
    }

    // LAME 扩展: 9 字节版本串, 版本/VBR 方法, 低通, 峰值 (4), 回放增益 (4),
    // 编码标志, 码率, 然后是 24 位的 delay(12) | padding(12)
    let lame = r.position() as usize;
    if let Some(tag) = bytes.get(lame..lame + 24) {
        if ENCODER_TAGS.iter().any(|t| &tag[..4] == *t) {
            xing.encoder = Some(
                String::from_utf8_lossy(&tag[..9])
                    .trim_end_matches('\0')
                    .trim()
                    .to_string(),
            );
            let packed = (u32::from(tag[21]) << 16) | (u32::from(tag[22]) << 8) | u32::from(tag[23]);
            let delay = packed >> 12;
            let padding = packed & 0xFFF;
            if delay <= MAX_GAPLESS_SAMPLES && padding <= MAX_GAPLESS_SAMPLES {
                meta.encoder_delay = delay;
                if meta.frames > 0 {
                    meta.set_padding(padding);
                }
                debug!(
                    "MP3: {:?} 扩展头, delay={delay}, padding={padding}",
                    xing.encoder.as_deref().unwrap_or("?")
                );
            }
        }
    }

    debug!(
        "MP3: 发现 {} 头, frames={:?}, bytes={:?}, toc={}",
        if is_info { "Info" } else { "Xing" },
        xing.frames,
        xing.bytes,
        meta.toc.is_some()
    );
    meta.side_header = SideHeader::Xing(xing);
}

/// 解析 VBRI 头的固定部分 (26 字节, 从标签开始)
fn parse_vbri_header(bytes: &[u8]) -> Option<VbriHeader> {
    let mut r = Cursor::new(bytes);
    r.set_position(4);
    Some(VbriHeader {
        version: r.read_u16::<BigEndian>().ok()?,
        delay: r.read_u16::<BigEndian>().ok()?,
        quality: r.read_u16::<BigEndian>().ok()?,
        bytes: r.read_u32::<BigEndian>().ok()?,
        frames: r.read_u32::<BigEndian>().ok()?,
        toc_entries: r.read_u16::<BigEndian>().ok()?,
        scale: r.read_u16::<BigEndian>().ok()?,
        entry_size: r.read_u16::<BigEndian>().ok()?,
        frames_per_entry: r.read_u16::<BigEndian>().ok()?,
    })
}

/// 应用 VBRI 头: 帧数、时长、编码器延迟以及目录定位表
fn apply_vbri(meta: &mut Mp3Metadata, vbri: VbriHeader, toc: &[u8]) {
    meta.vbr = true;
    meta.frames = u64::from(vbri.frames);
    meta.duration = meta.frame_time(meta.frames);
    meta.encoder_delay = VBRI_DELAY;
    if vbri.frames > 0 && vbri.bytes > 0 {
        meta.average_frame_size = f64::from(vbri.bytes) / f64::from(vbri.frames);
    }

    let entry_size = usize::from(vbri.entry_size);
    if (1..=4).contains(&entry_size) && toc.len() >= usize::from(vbri.toc_entries) * entry_size {
        let sizes = toc.chunks_exact(entry_size).map(|entry| {
            entry
                .iter()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
        });
        meta.seek_table = Some(Mp3SeekTable::from_vbri(
            &meta.layout(),
            meta.frames,
            u64::from(vbri.frames_per_entry),
            u64::from(vbri.scale),
            sizes,
        ));
    } else {
        warn!("MP3: VBRI 目录条目大小 {entry_size} 无效, 忽略目录");
    }

    debug!(
        "MP3: 发现 VBRI 头, frames={}, 目录 {} 项",
        vbri.frames, vbri.toc_entries
    );
    meta.side_header = SideHeader::Vbri(vbri);
}

/// 没有侧边头时估算时长: CBR 按字节数, VBR 逐帧扫描
fn estimate_duration(
    meta: &mut Mp3Metadata,
    io: &mut IoContext,
    options: &DemuxOptions,
) -> YinResult<()> {
    if meta.data_end == u64::MAX {
        return Ok(());
    }
    if meta.vbr && !options.no_seek_table {
        let mut table = Mp3SeekTable::new();
        table.fill_until(FULL_SCAN_HORIZON, &meta.layout(), io)?;
        meta.frames = table.frames();
        meta.duration = meta.frame_time(meta.frames);
        if meta.frames > 0 {
            meta.average_frame_size =
                meta.data_end.saturating_sub(meta.data_start) as f64 / meta.frames as f64;
        }
        meta.seek_table = Some(table);
    } else {
        let size = meta.data_end.saturating_sub(meta.data_start);
        meta.duration = (size * 8) as f64 / f64::from(meta.bit_rate);
        meta.frames = (f64::from(meta.sample_rate) * meta.duration
            / f64::from(meta.samples_per_frame)) as u64;
    }
    Ok(())
}

/// 小端 u32, 不足 4 字节时返回 None
fn le_u32(bytes: &[u8]) -> Option<u32> {
    (bytes.len() >= 4).then(|| LittleEndian::read_u32(bytes))
}
