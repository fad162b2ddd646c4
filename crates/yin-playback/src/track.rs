//! 单条音轨的解码上下文.
//!
//! 把解封装器输出的帧送入解码器, 处理编码器延迟与尾部填充的裁剪,
//! 再按目标时长切分成 `DecodedPcmBuffer`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use yin_codec::decoders::mp3::{DECODER_DELAY, MAX_FRAME_BYTES, MAX_INVALID_FRAME_COUNT};
use yin_codec::{Mp3Decoder, PcmSamples};
use yin_core::time::{buffer_end_time, frames_to_seconds, seconds_to_frames};
use yin_core::{YinError, YinResult};
use yin_format::{
    DemuxOptions, Demuxer, FormatId, FormatRegistry, IoContext, Mp3Demuxer, SeekResult,
};

use crate::buffer::DecodedPcmBuffer;
use crate::config::PlaybackConfig;
use crate::pool::{PlanarStorage, shape};

/// 末尾缓冲补齐到的帧数倍数
pub const BLOCK_SIZE: usize = 128;

/// 音轨数据源
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSource {
    Path(PathBuf),
    /// 内存数据, `name` 用于按扩展名探测
    Memory { name: String, data: Arc<[u8]> },
    Url(String),
}

impl TrackSource {
    pub fn memory(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            name: name.into(),
            data: data.into(),
        }
    }

    /// 用于探测的文件名
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Path(path) => path.file_name().and_then(|n| n.to_str()),
            Self::Memory { name, .. } => Some(name),
            Self::Url(url) => url.rsplit('/').next(),
        }
    }

    fn open_io(&self) -> YinResult<IoContext> {
        match self {
            Self::Path(path) => IoContext::open_read(path),
            Self::Memory { data, .. } => Ok(IoContext::from_memory(data.to_vec())),
            Self::Url(url) => IoContext::open_url(url),
        }
    }
}

impl std::fmt::Display for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Memory { name, data } => write!(f, "{name} ({} 字节, 内存)", data.len()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// 音轨信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackInfo {
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: u64,
    pub encoder_delay: u32,
    pub encoder_padding: u32,
    pub vbr: bool,
}

/// 音轨解码器
pub struct TrackDecoder {
    source: TrackSource,
    io: IoContext,
    demuxer: Box<dyn Demuxer>,
    decoder: Mp3Decoder,
    info: TrackInfo,
    /// 目标缓冲长度 (帧)
    buffer_frames: usize,
    decoder_delay: u32,
    padding_trim: Option<(u64, u32)>,
    /// 侧边头给出的确切帧数, 解码到此为止; 估算值不作为上限
    frame_limit: Option<u64>,
    data_end: u64,
    /// 下一个解码出的 MPEG 帧的序号
    mp3_frame: u64,
    /// 尚需丢弃的样本数
    samples_to_skip: u64,
    /// 下一个输出样本在音轨时间轴上的位置
    position: u64,
    /// 已解码未输出的样本
    pending: PlanarStorage,
    invalid_frames: u32,
    exhausted: bool,
    /// 致命解码错误, 已解出的样本输出完后上报
    failure: Option<YinError>,
}

impl TrackDecoder {
    /// 打开数据源并解析元数据
    pub fn open(source: TrackSource, config: &PlaybackConfig) -> YinResult<Self> {
        let mut io = source.open_io()?;
        let mut registry = FormatRegistry::new();
        yin_format::register_all(&mut registry);
        let probed = registry.probe_input(&mut io, source.name())?;
        if !matches!(probed.format_id, FormatId::Mp3 | FormatId::RiffMp3) {
            return Err(YinError::Unsupported(format!("{}", probed.format_id)));
        }

        let options = DemuxOptions {
            scan_policy: config.scan_policy(),
            minimum_duration: config.minimum_track_duration,
            no_seek_table: false,
        };
        let mut demuxer: Box<dyn Demuxer> = Box::new(Mp3Demuxer::with_options(options));
        demuxer.open(&mut io)?;
        let meta = demuxer
            .metadata()
            .ok_or_else(|| YinError::Internal("解封装后缺少元数据".into()))?;

        let info = TrackInfo {
            duration: meta.duration,
            sample_rate: meta.sample_rate,
            channels: meta.channels as usize,
            frames: meta.frames,
            encoder_delay: meta.encoder_delay,
            encoder_padding: meta.encoder_padding,
            vbr: meta.vbr,
        };
        let frame_limit = meta.frame_count_is_exact().then_some(meta.frames);
        let padding_trim = meta.padding_trim();
        let data_end = meta.data_end;
        let decoder_delay = config.decoder_delay_override.unwrap_or(DECODER_DELAY);
        let buffer_frames = seconds_to_frames(config.buffer_time(), info.sample_rate).max(1) as usize;

        debug!(
            "打开音轨 {}: {:.3}s, {} Hz, {} 声道, 延迟 {} + {}, 缓冲 {} 帧",
            source,
            info.duration,
            info.sample_rate,
            info.channels,
            info.encoder_delay,
            decoder_delay,
            buffer_frames
        );

        Ok(Self {
            source,
            io,
            demuxer,
            decoder: Mp3Decoder::new(config.output_format.sample_format()),
            info,
            buffer_frames,
            decoder_delay,
            padding_trim,
            frame_limit,
            data_end,
            mp3_frame: 0,
            samples_to_skip: u64::from(info.encoder_delay) + u64::from(decoder_delay),
            position: 0,
            pending: vec![Vec::new(); info.channels],
            invalid_frames: 0,
            exhausted: false,
            failure: None,
        })
    }

    pub fn source(&self) -> &TrackSource {
        &self.source
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// 目标缓冲长度 (帧)
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    /// 所有样本都已输出
    pub fn is_ended(&self) -> bool {
        self.exhausted && self.pending_len() == 0 && self.failure.is_none()
    }

    /// 下一个缓冲的起始时间
    pub fn current_time(&self) -> f64 {
        frames_to_seconds(self.position, self.info.sample_rate)
    }

    /// 定位到 `time` 秒, 返回实际定位结果
    pub fn seek(&mut self, time: f64) -> YinResult<SeekResult> {
        let result = self.demuxer.seek(&mut self.io, time)?;
        self.decoder.reset();
        self.mp3_frame = result.frame;
        self.samples_to_skip = result.samples_to_skip;
        if result.frame == 0 {
            self.samples_to_skip += u64::from(self.decoder_delay);
        }
        self.position = seconds_to_frames(result.time, self.info.sample_rate);
        for plane in &mut self.pending {
            plane.clear();
        }
        self.invalid_frames = 0;
        self.exhausted = false;
        self.failure = None;
        Ok(result)
    }

    /// 解码下一个缓冲, 写入 `storage` (复用其分配)
    ///
    /// 音轨已结束时返回 None.
    pub fn next_buffer(&mut self, mut storage: PlanarStorage) -> YinResult<Option<DecodedPcmBuffer>> {
        let started = Instant::now();
        let target = self.buffer_frames;
        // 多解一帧才能判断这是不是最后一个缓冲
        while self.pending_len() <= target && !self.exhausted {
            self.decode_next_frame()?;
        }
        let available = self.pending_len();
        if available == 0 {
            return match self.failure.take() {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }

        let length = available.min(target);
        let is_last_buffer = self.exhausted && available <= target && self.failure.is_none();
        let padded = if length < target {
            length.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
        } else {
            length
        };

        shape(&mut storage, self.info.channels, padded);
        for (dst, src) in storage.iter_mut().zip(self.pending.iter_mut()) {
            dst[..length].copy_from_slice(&src[..length]);
            dst[length..].fill(0.0);
            src.drain(..length);
        }

        let sample_rate = self.info.sample_rate;
        let start_time = frames_to_seconds(self.position, sample_rate);
        self.position += length as u64;
        Ok(Some(DecodedPcmBuffer {
            channel_count: self.info.channels,
            sample_rate,
            samples: storage,
            length: padded,
            start_time,
            end_time: buffer_end_time(start_time, padded, sample_rate),
            is_last_buffer,
            decoding_latency: started.elapsed().as_secs_f64(),
        }))
    }

    fn pending_len(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    /// 读取并解码一帧, 结果追加到 `pending`
    fn decode_next_frame(&mut self) -> YinResult<()> {
        if self.frame_limit.is_some_and(|limit| self.mp3_frame >= limit) {
            self.exhausted = true;
            return Ok(());
        }
        let packet = match self.demuxer.read_packet(&mut self.io) {
            Ok(packet) => packet,
            Err(YinError::Eof) => {
                self.exhausted = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let decoded = match self.decoder.decode_frame(&packet.data) {
            Ok(decoded) => decoded,
            Err(YinError::InvalidData(_) | YinError::NeedMoreData) => {
                self.invalid_frames += 1;
                if self.invalid_frames >= MAX_INVALID_FRAME_COUNT {
                    warn!("{}: 连续 {} 个无效帧, 停止解码", self.source, self.invalid_frames);
                    self.exhausted = true;
                    self.failure = Some(YinError::Decode(format!(
                        "{}: 连续 {} 个无效帧",
                        self.source, self.invalid_frames
                    )));
                    return Ok(());
                }
                let remaining = self.data_end.saturating_sub(packet.pos.max(0) as u64);
                if remaining <= MAX_FRAME_BYTES as u64 {
                    debug!("末尾剩余 {} 字节无法解码, 音轨结束", remaining);
                    self.exhausted = true;
                }
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.invalid_frames = 0;

        let index = self.mp3_frame;
        self.mp3_frame += 1;
        let mut len = decoded.len;
        if let Some((padding_frame, trim)) = self.padding_trim {
            if index > padding_frame {
                return Ok(());
            }
            if index == padding_frame {
                len = len.saturating_sub(trim as usize);
            }
        }

        let skip = (self.samples_to_skip.min(len as u64)) as usize;
        self.samples_to_skip -= skip as u64;
        if skip == len {
            return Ok(());
        }
        if decoded.header.nb_channels != self.pending.len() {
            warn!(
                "{}: 声道数变化 ({} -> {}), 丢弃该帧",
                self.source,
                self.pending.len(),
                decoded.header.nb_channels
            );
            return Ok(());
        }
        append_samples(&mut self.pending, decoded.samples, skip..len);
        Ok(())
    }
}

/// 把 `samples` 的 `range` 段追加到平面存储, 整数样本转换为浮点
///
/// 只取前 `dst.len()` 个声道.
fn append_samples(dst: &mut PlanarStorage, samples: &PcmSamples, range: std::ops::Range<usize>) {
    match samples {
        PcmSamples::F32(planes) => {
            for (out, plane) in dst.iter_mut().zip(planes) {
                out.extend_from_slice(&plane[range.clone()]);
            }
        }
        PcmSamples::S16(planes) => {
            for (out, plane) in dst.iter_mut().zip(planes) {
                out.extend(plane[range.clone()].iter().map(|&s| f32::from(s) / 32768.0));
            }
        }
    }
}
