//! MPEG-1/2/2.5 Layer III 解码器
//!
//! 纯定点实现, 输出与参考解码器逐位一致. 解码器是一个可恢复的状态机:
//! 任意长度的输入块都可以送入 [`Mp3Decoder::update`], 帧头按字节重同步,
//! 凑齐一帧后立即解码, 合成出的样本累积到目标长度后作为一个 [`PcmFrame`] 输出.
//!
//! 逐帧接口 [`Mp3Decoder::decode_frame`] 供上层自行管理样本裁剪的场景使用
//! (如无缝播放时去掉编码器延迟与填充).

mod alias;
mod bit_reservoir;
mod data;
mod fixed;
mod header;
mod huffman;
mod imdct;
mod reorder;
mod requantize;
mod side_info;
mod stereo;
mod synthesis;
mod tables;

use std::collections::VecDeque;

use log::{debug, trace, warn};
use yin_core::{BitReader, ChannelLayout, SampleFormat, YinError, YinResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::{PcmFrame, PcmSamples};
use crate::packet::Packet;

use self::alias::compute_antialias;
use self::bit_reservoir::{BACKSTEP_SIZE, BitReservoir, SplicedReader};
use self::data::{ChannelState, GRANULE_SIZE, Granule, SBLIMIT};
use self::huffman::huffman_decode;
use self::imdct::compute_imdct;
use self::reorder::reorder_block;
use self::requantize::{compute_exponents, read_lsf_scale_factors, read_scale_factors};
use self::side_info::SideInfo;
use self::stereo::compute_stereo;
use self::synthesis::{OutputSample, SynthState, synth_filter};

pub use self::header::{
    ChannelMode, HEADER_SIZE, MAX_FRAME_BYTES, Mp3Header, MpegVersion, check_header,
};

/// 解码器固有延迟 (样本), 合成滤波器组引入
pub const DECODER_DELAY: u32 = 529;
/// 连续无效帧上限, 达到后视为整条音轨无法解码
pub const MAX_INVALID_FRAME_COUNT: u32 = 100;
/// 默认输出缓冲时长 (秒)
pub const DEFAULT_BUFFER_LENGTH: f64 = 2.0;
/// 最短输出缓冲时长: 8kHz 下一个 MPEG-1 帧
pub const MIN_BUFFER_LENGTH: f64 = 1152.0 / 8000.0;
/// 最长输出缓冲时长
pub const MAX_BUFFER_LENGTH: f64 = 5.0;
/// 单帧最多样本数 (每声道)
pub const MAX_SAMPLES_PER_FRAME: usize = 1152;

/// 把输出缓冲时长限制到允许范围, 非有限值返回 None
pub fn clamp_buffer_length(seconds: f64) -> Option<f64> {
    seconds
        .is_finite()
        .then(|| seconds.clamp(MIN_BUFFER_LENGTH, MAX_BUFFER_LENGTH))
}

/// 逐帧解码的结果 (借用解码器内部的暂存缓冲)
#[derive(Debug)]
pub struct DecodedFrame<'a> {
    /// 该帧帧头
    pub header: Mp3Header,
    /// 平面样本, 每声道有效长度为 `len`
    pub samples: &'a PcmSamples,
    pub len: usize,
}

/// MP3 解码器
pub struct Mp3Decoder {
    /// 输出采样格式 (平面)
    output_format: SampleFormat,
    /// 目标输出缓冲时长 (秒)
    buffer_length: f64,

    /// 已接受帧头、等待帧数据; None 表示正在查找帧头
    pending: Option<Mp3Header>,
    /// 查找帧头时滚动的 32 位窗口
    header_word: u32,
    /// 最近一次接受的帧头
    stream: Option<Mp3Header>,
    /// 当前帧除帧头外的字节
    source: Vec<u8>,

    granules: Box<[Granule; 4]>,
    channels: Box<[ChannelState; 2]>,
    exponents: Box<[u16; GRANULE_SIZE]>,
    reservoir: BitReservoir,
    dither_state: i32,

    /// 单帧合成输出
    scratch: PcmSamples,
    /// 累积中的输出缓冲
    acc: Option<PcmSamples>,
    acc_len: usize,
    samples_processed: u64,
    invalid_frame_count: u32,
    flushed: bool,
    ready: VecDeque<PcmFrame>,
    /// 已收到排空信号 (空包)
    draining: bool,
}

impl Default for Mp3Decoder {
    fn default() -> Self {
        Self::new(SampleFormat::F32p)
    }
}

impl Mp3Decoder {
    /// 创建解码器, `output_format` 只区分整数与浮点, 输出总是平面格式
    pub fn new(output_format: SampleFormat) -> Self {
        let output_format = output_format.to_planar();
        Self {
            output_format,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            pending: None,
            header_word: 0,
            stream: None,
            source: Vec::with_capacity(MAX_FRAME_BYTES),
            granules: Box::new(std::array::from_fn(|_| Granule::default())),
            channels: Box::new(std::array::from_fn(|_| ChannelState::default())),
            exponents: Box::new([0; GRANULE_SIZE]),
            reservoir: BitReservoir::new(),
            dither_state: 0,
            scratch: PcmSamples::new(output_format, 2, MAX_SAMPLES_PER_FRAME),
            acc: None,
            acc_len: 0,
            samples_processed: 0,
            invalid_frame_count: 0,
            flushed: false,
            ready: VecDeque::new(),
            draining: false,
        }
    }

    /// 工厂函数 (注册表使用)
    pub fn create() -> YinResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::default()))
    }

    /// 输出采样格式
    pub fn output_format(&self) -> SampleFormat {
        self.output_format
    }

    /// 目标输出缓冲时长 (秒)
    pub fn buffer_length(&self) -> f64 {
        self.buffer_length
    }

    /// 设置目标输出缓冲时长, 先输出已累积的样本
    pub fn set_buffer_length(&mut self, seconds: f64) -> YinResult<()> {
        let seconds = clamp_buffer_length(seconds).ok_or_else(|| {
            YinError::InvalidArgument(format!("缓冲时长必须为有限数值: {}", seconds))
        })?;
        self.flush_samples();
        self.buffer_length = seconds;
        Ok(())
    }

    /// 采样率, 尚未解析到帧头时为 None
    pub fn sample_rate(&self) -> Option<u32> {
        self.stream.map(|h| h.sample_rate)
    }

    /// 声道数, 尚未解析到帧头时为 None
    pub fn channel_count(&self) -> Option<usize> {
        self.stream.map(|h| h.nb_channels)
    }

    /// 已输出到累积缓冲的时长 (秒)
    pub fn current_time(&self) -> Option<f64> {
        self.stream
            .map(|h| self.samples_processed as f64 / f64::from(h.sample_rate))
    }

    /// 已合成的样本数 (每声道)
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// 取出一个已完成的输出缓冲
    pub fn take_frame(&mut self) -> Option<PcmFrame> {
        self.ready.pop_front()
    }

    /// 已完成、尚未取出的输出缓冲数
    pub fn ready_frames(&self) -> usize {
        self.ready.len()
    }

    /// 送入任意长度的字节, 返回消耗的字节数
    ///
    /// `break_on_flush` 为 true 时, 一旦有输出缓冲完成就立即返回,
    /// 剩余字节由调用方稍后再送入.
    pub fn update(&mut self, src: &[u8], break_on_flush: bool) -> YinResult<usize> {
        let mut pos = 0;
        while pos < src.len() {
            match self.pending {
                None => {
                    let mut header = self.header_word;
                    let mut found = None;
                    for (i, &byte) in src[pos..].iter().enumerate() {
                        header = (header << 8) | u32::from(byte);
                        if check_header(header) {
                            if let Some(h) = Mp3Header::decode(header) {
                                found = Some((i, h));
                                break;
                            }
                        }
                    }
                    self.header_word = header;
                    match found {
                        Some((i, h)) => {
                            pos += i + 1;
                            self.pending = Some(h);
                            self.stream = Some(h);
                        }
                        None => pos = src.len(),
                    }
                }
                Some(header) => {
                    self.ensure_buffers(&header);
                    let needed = header
                        .frame_size
                        .saturating_sub(HEADER_SIZE + self.source.len());
                    let available = src.len() - pos;
                    if available < needed {
                        self.source.extend_from_slice(&src[pos..]);
                        pos = src.len();
                        break;
                    }
                    self.source.extend_from_slice(&src[pos..pos + needed]);
                    pos += needed;
                    let flushed = self.decode(&header);
                    self.source.clear();
                    self.pending = None;
                    self.header_word = 0;
                    if flushed? && break_on_flush {
                        return Ok(pos);
                    }
                }
            }
        }
        Ok(pos)
    }

    /// 解码直到有一个输出缓冲完成 (或输入耗尽), 返回消耗的字节数
    pub fn decode_until_flush(&mut self, src: &[u8]) -> YinResult<usize> {
        self.update(src, true)
    }

    /// 解码一个完整帧 (含帧头), 不经过累积缓冲
    ///
    /// 帧内数据损坏时返回 `InvalidData`, 位存储器状态仍会推进.
    pub fn decode_frame(&mut self, frame: &[u8]) -> YinResult<DecodedFrame<'_>> {
        let header = Mp3Header::from_bytes(frame)?;
        if frame.len() < header.frame_size {
            return Err(YinError::NeedMoreData);
        }
        self.stream = Some(header);
        self.source.clear();
        self.source
            .extend_from_slice(&frame[HEADER_SIZE..header.frame_size]);
        let n = self.decode_main(&header);
        self.source.clear();
        if n < 0 {
            return Err(YinError::InvalidData("Layer III 帧数据损坏".into()));
        }
        Ok(DecodedFrame {
            header,
            samples: &self.scratch,
            len: n as usize,
        })
    }

    /// 输出已累积的样本, 然后把全部解码状态恢复到初始值
    pub fn end(&mut self) {
        self.flush_samples();
        self.flushed = false;
        self.pending = None;
        self.header_word = 0;
        self.stream = None;
        self.source.clear();
        self.reservoir.clear();
        for ch in self.channels.iter_mut() {
            ch.reset();
        }
        self.dither_state = 0;
        self.acc = None;
        self.acc_len = 0;
        self.samples_processed = 0;
        self.invalid_frame_count = 0;
    }

    /// 清除解码状态与未取出的输出 (定位后使用)
    pub fn reset(&mut self) {
        self.end();
        self.ready.clear();
        self.draining = false;
    }

    fn target_samples(&self, header: &Mp3Header) -> usize {
        (f64::from(header.sample_rate) * self.buffer_length) as usize
    }

    /// 按当前帧头准备累积缓冲, 形状变化时先输出旧数据
    fn ensure_buffers(&mut self, header: &Mp3Header) {
        let target = self.target_samples(header);
        let matches = self
            .acc
            .as_ref()
            .is_some_and(|acc| acc.channels() == header.nb_channels && acc.len() == target);
        if matches {
            return;
        }
        self.flush_samples();
        self.acc = Some(PcmSamples::new(
            self.output_format,
            header.nb_channels,
            target,
        ));
    }

    /// 解码 `source` 中的一帧并处理连续无效帧计数, 返回本帧是否输出了缓冲
    fn decode(&mut self, header: &Mp3Header) -> YinResult<bool> {
        let n = self.decode_main(header);
        if n >= 0 {
            self.invalid_frame_count = 0;
            self.push_samples(header, n as usize);
        } else {
            self.invalid_frame_count += 1;
            debug!("无效帧, 连续 {} 个", self.invalid_frame_count);
            if self.invalid_frame_count >= MAX_INVALID_FRAME_COUNT {
                warn!("连续 {} 个无效帧, 停止解码", self.invalid_frame_count);
                self.end();
                return Err(YinError::Decode(format!(
                    "连续 {} 个无效帧",
                    MAX_INVALID_FRAME_COUNT
                )));
            }
        }
        Ok(std::mem::take(&mut self.flushed))
    }

    /// 把暂存缓冲中的 `n` 个样本追加到累积缓冲, 满了就输出
    fn push_samples(&mut self, header: &Mp3Header, n: usize) {
        if n == 0 {
            return;
        }
        let target = self.target_samples(header);
        let Some(acc) = self.acc.as_mut() else {
            return;
        };
        if self.acc_len + n > target {
            let remaining = target.saturating_sub(self.acc_len);
            acc.copy_from(self.acc_len, &self.scratch, 0, remaining);
            self.acc_len += remaining;
            self.samples_processed += remaining as u64;
            self.flush_samples();

            let overflow = n - remaining;
            if let Some(acc) = self.acc.as_mut() {
                acc.copy_from(0, &self.scratch, remaining, overflow);
            }
            self.acc_len = overflow;
            self.samples_processed += overflow as u64;
        } else {
            acc.copy_from(self.acc_len, &self.scratch, 0, n);
            self.acc_len += n;
            self.samples_processed += n as u64;
        }
    }

    /// 输出累积缓冲中的样本 (没有样本时不产生空缓冲)
    fn flush_samples(&mut self) {
        if self.acc_len == 0 {
            return;
        }
        let (Some(header), Some(acc)) = (self.stream, self.acc.as_mut()) else {
            return;
        };
        let len = self.acc_len;
        let samples = if len == acc.len() {
            let fresh = PcmSamples::new(acc.sample_format(), acc.channels(), acc.len());
            std::mem::replace(acc, fresh)
        } else {
            acc.truncated(len)
        };
        let channels = samples.channels() as u32;
        trace!("输出缓冲: {} 个样本", len);
        self.ready.push_back(PcmFrame {
            samples,
            nb_samples: len,
            sample_rate: header.sample_rate,
            channel_layout: ChannelLayout::from_channels(channels),
            pts: self.samples_processed - len as u64,
        });
        self.acc_len = 0;
        self.flushed = true;
    }

    /// 解码 `source` 中的一帧到暂存缓冲, 返回每声道样本数, 失败返回负数
    fn decode_main(&mut self, header: &Mp3Header) -> i32 {
        let body = &self.source[..];
        let mut gb = BitReader::new(body);
        if header.error_protection {
            // CRC
            gb.skip_bits(16);
        }

        let (nb_frames, keep, frame_gb) =
            match SideInfo::parse(&mut gb, header, &mut self.granules) {
                Ok(si) => {
                    let pos = gb.bits_read() >> 3;
                    self.reservoir.prepare(si.main_data_begin, body, pos);
                    let mut reader =
                        SplicedReader::new(self.reservoir.reader(si.main_data_begin), gb);

                    let mut nb_frames = (si.nb_granules * 18) as i32;
                    'granules: for gr in 0..si.nb_granules {
                        for ch in 0..header.nb_channels {
                            let bits_pos = reader.pos();
                            let idx = ch * 2 + gr;
                            if header.lsf {
                                read_lsf_scale_factors(
                                    &mut self.granules[idx],
                                    &mut reader.gb,
                                    header,
                                    ch,
                                );
                            } else {
                                let prev = self.granules[ch * 2].scale_factors;
                                read_scale_factors(&mut self.granules[idx], &mut reader.gb, &prev);
                            }
                            let g = &mut self.granules[idx];
                            compute_exponents(g, header, &mut self.exponents);
                            let end_pos2 = bits_pos + g.part2_3_length as isize;
                            if let Err(e) = huffman_decode(g, &self.exponents, &mut reader, end_pos2)
                            {
                                debug!("granule {}/{} 解码失败: {}", gr, ch, e);
                                nb_frames = -1;
                                break 'granules;
                            }
                        }

                        if header.nb_channels == 2 {
                            let (left, right) = self.granules.split_at_mut(2);
                            compute_stereo(header, &mut left[gr], &mut right[gr]);
                        }

                        for ch in 0..header.nb_channels {
                            let g = &mut self.granules[ch * 2 + gr];
                            reorder_block(g, header.sample_rate_index);
                            compute_antialias(g);
                            let state = &mut self.channels[ch];
                            let rows = 18 * gr * SBLIMIT..18 * (gr + 1) * SBLIMIT;
                            compute_imdct(g, &mut state.sb_samples[rows], &mut state.mdct_buf);
                        }
                    }

                    // 储备库中尚未读完的字节保留给下一帧
                    let (mut gb, in_gb) = reader.into_parts();
                    let mut keep = None;
                    if let Some(frame_gb) = in_gb {
                        gb.align();
                        let left = (gb.bit_size() as isize - gb.bits_read() as isize) >> 3;
                        if (0..=BACKSTEP_SIZE as isize).contains(&left) {
                            let start = gb.byte_position();
                            keep = Some(start..start + left as usize);
                        }
                        gb = frame_gb;
                    }
                    (nb_frames, keep, gb)
                }
                Err(e) => {
                    debug!("侧边信息无效: {}", e);
                    (-1, None, gb)
                }
            };

        let mut gb = frame_gb;
        gb.align();
        let mut tail = (gb.bit_size() as isize - gb.bits_read() as isize) >> 3;
        if tail < 0 || tail > BACKSTEP_SIZE as isize || nb_frames < 0 {
            tail = body.len().min(BACKSTEP_SIZE) as isize;
        }
        self.reservoir.retain(keep);
        self.reservoir.append_tail(&self.source, tail as usize);

        if nb_frames <= 0 {
            return nb_frames.min(0) * SBLIMIT as i32;
        }
        let nb_frames = nb_frames as usize;
        for ch in 0..header.nb_channels {
            let ChannelState {
                sb_samples,
                synth_buf,
                synth_buf_offset,
                ..
            } = &mut self.channels[ch];
            let mut state = SynthState {
                buf: synth_buf,
                offset: synth_buf_offset,
                dither: &mut self.dither_state,
            };
            match &mut self.scratch {
                PcmSamples::S16(planes) => {
                    synth_channel(&mut state, &sb_samples[..], &mut planes[ch], nb_frames)
                }
                PcmSamples::F32(planes) => {
                    synth_channel(&mut state, &sb_samples[..], &mut planes[ch], nb_frames)
                }
            }
        }
        (nb_frames * SBLIMIT) as i32
    }
}

fn synth_channel<S: OutputSample>(
    state: &mut SynthState<'_>,
    sb_samples: &[i32],
    out: &mut [S],
    nb_frames: usize,
) {
    for i in 0..nb_frames {
        let span = i * SBLIMIT..(i + 1) * SBLIMIT;
        synth_filter(state, &sb_samples[span.clone()], &mut out[span]);
    }
}

impl Decoder for Mp3Decoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Mp3
    }

    fn name(&self) -> &str {
        "mp3"
    }

    fn open(&mut self, params: &CodecParameters) -> YinResult<()> {
        if params.codec_id != CodecId::Mp3 {
            return Err(YinError::InvalidArgument(format!(
                "MP3 解码器不能打开 {}",
                params.codec_id
            )));
        }
        let format = params.sample_format.to_planar();
        self.reset();
        if format != self.output_format {
            self.output_format = format;
            self.scratch = PcmSamples::new(format, 2, MAX_SAMPLES_PER_FRAME);
        }
        if let Some(seconds) = params.buffer_length {
            self.set_buffer_length(seconds)?;
        }
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> YinResult<()> {
        if packet.is_empty() {
            self.draining = true;
            self.flush_samples();
            return Ok(());
        }
        self.update(&packet.data, false).map(|_| ())
    }

    fn receive_frame(&mut self) -> YinResult<PcmFrame> {
        match self.ready.pop_front() {
            Some(frame) => Ok(frame),
            None if self.draining => Err(YinError::Eof),
            None => Err(YinError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::side_info::tests::BitWriter;
    use super::*;

    /// MPEG-1 44.1kHz 128kbps 立体声, 417 字节
    const MPEG1_STEREO: u32 = 0xFFFB_9000;
    /// MPEG-2 22.05kHz 64kbps 单声道, 208 字节
    const MPEG2_MONO: u32 = 0xFFF3_80C0;

    /// 侧边信息全零的静音帧
    fn silent_frame(header: u32) -> Vec<u8> {
        let h = Mp3Header::parse(header).unwrap();
        let mut frame = vec![0u8; h.frame_size];
        frame[..4].copy_from_slice(&header.to_be_bytes());
        frame
    }

    /// big_values 超限的损坏帧
    fn corrupt_frame() -> Vec<u8> {
        let mut frame = silent_frame(MPEG1_STEREO);
        frame[HEADER_SIZE + 4] = 0xFF;
        frame
    }

    fn stream(frames: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for _ in 0..frames {
            data.extend(silent_frame(MPEG1_STEREO));
        }
        data
    }

    /// 单声道 MPEG-1 44.1kHz 128kbps, 417 字节
    const MPEG1_MONO: u32 = 0xFFFB_90C4;
    /// 联合立体声, 仅强度立体声
    const MPEG1_INTENSITY: u32 = 0xFFFB_9050;

    /// 一个声道每个 granule 的内容: 只有 count1 区 (码表 B), 在给定位置放 ±1
    struct ChannelData<'a> {
        global_gain: u32,
        /// (位置, 是否为负)
        spectrum: &'a [(usize, bool)],
        /// 全部长块比例因子取同一个 3 位值
        scale_factor: Option<u32>,
    }

    impl ChannelData<'_> {
        /// 主数据字段 (位数, 值): 比例因子, 然后码表 B 的 4 元组
        fn main_data(&self) -> Vec<(u32, u32)> {
            let mut fields = Vec::new();
            if let Some(sf) = self.scale_factor {
                fields.extend(std::iter::repeat_n((3, sf), 21));
            }
            let quads = self.spectrum.iter().map(|(pos, _)| pos / 4 + 1).max().unwrap_or(0);
            for q in 0..quads {
                let mut entries: Vec<_> = self.spectrum.iter().filter(|(pos, _)| pos / 4 == q).collect();
                entries.sort_by_key(|(pos, _)| *pos);
                let symbol = entries.iter().fold(0, |acc, (pos, _)| acc | (8 >> (pos % 4)));
                // 码表 B 的码字是 15 - 符号, 每个非零值后跟符号位
                fields.push((4, 15 - symbol));
                for (_, negative) in entries {
                    fields.push((1, u32::from(*negative)));
                }
            }
            fields
        }

        fn scalefac_compress(&self) -> u32 {
            // slen1 = slen2 = 3
            if self.scale_factor.is_some() { 13 } else { 0 }
        }
    }

    /// 两个 granule 内容相同的 Layer III 帧, 主数据紧跟侧边信息
    fn layer3_frame(header: u32, channels: &[ChannelData<'_>]) -> Vec<u8> {
        let h = Mp3Header::parse(header).unwrap();
        assert_eq!(h.nb_channels, channels.len());
        let main: Vec<_> = channels.iter().map(ChannelData::main_data).collect();
        let mut w = BitWriter::new();
        w.put(9, 0); // main_data_begin
        w.put(if channels.len() == 2 { 3 } else { 5 }, 0);
        w.put(4 * channels.len() as u32, 0); // scfsi
        for _ in 0..2 {
            for (ch, fields) in channels.iter().zip(&main) {
                w.put(12, fields.iter().map(|(n, _)| n).sum());
                w.put(9, 0); // big_values
                w.put(8, ch.global_gain);
                w.put(4, ch.scalefac_compress());
                w.put(1, 0); // 无窗切换
                w.put(15, 0); // table_select
                w.put(7, 0); // region0/1
                w.put(2, 0); // preflag, scalefac_scale
                w.put(1, 1); // count1 码表 B
            }
        }
        for _ in 0..2 {
            for fields in &main {
                for &(n, v) in fields {
                    w.put(n, v);
                }
            }
        }
        let mut frame = header.to_be_bytes().to_vec();
        frame.extend(&w.bytes);
        assert!(frame.len() <= h.frame_size);
        frame.resize(h.frame_size, 0);
        frame
    }

    /// 连续解码同一帧 `count` 次, 返回各声道拼接后的样本
    fn decode_repeated(frame: &[u8], count: usize) -> Vec<Vec<i16>> {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        let mut planes: Vec<Vec<i16>> = Vec::new();
        for _ in 0..count {
            let out = dec.decode_frame(frame).unwrap();
            let PcmSamples::S16(p) = out.samples else {
                panic!("输出格式错误");
            };
            planes.resize(p.len(), Vec::new());
            for (dst, src) in planes.iter_mut().zip(p) {
                dst.extend_from_slice(&src[..out.len]);
            }
        }
        planes
    }

    /// 每个子带第 8 条谱线放一个 ±1
    fn sparse_spectrum() -> Vec<(usize, bool)> {
        (0..32).map(|k| (18 * k + 8, k % 3 == 1)).collect()
    }

    #[test]
    fn test_帧头重同步() {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        assert_eq!(dec.sample_rate(), None);
        let mut data = vec![0x12, 0xFF, 0x00, 0x47];
        data.extend(stream(3));
        let consumed = dec.update(&data, false).unwrap();
        assert_eq!(consumed, data.len());
        assert_eq!(dec.sample_rate(), Some(44100));
        assert_eq!(dec.channel_count(), Some(2));
        assert_eq!(dec.samples_processed(), 3 * 1152);
    }

    #[test]
    fn test_分块输入与整块输入一致() {
        let data = stream(4);
        let mut whole = Mp3Decoder::new(SampleFormat::S16);
        whole.update(&data, false).unwrap();

        let mut chunked = Mp3Decoder::new(SampleFormat::S16);
        for chunk in data.chunks(7) {
            chunked.update(chunk, false).unwrap();
        }
        assert_eq!(whole.samples_processed(), chunked.samples_processed());
        assert_eq!(chunked.samples_processed(), 4 * 1152);
    }

    #[test]
    fn test_累积缓冲满时输出() {
        let mut dec = Mp3Decoder::new(SampleFormat::F32);
        dec.set_buffer_length(MIN_BUFFER_LENGTH).unwrap();
        dec.update(&stream(10), false).unwrap();
        // 0.144s * 44100 = 6350
        let frame = dec.take_frame().unwrap();
        assert_eq!(frame.nb_samples, 6350);
        assert_eq!(frame.pts, 0);
        assert_eq!(frame.sample_rate, 44100);
        assert!(matches!(frame.samples, PcmSamples::F32(_)));
        assert!(dec.take_frame().is_none());

        dec.end();
        let rest = dec.take_frame().unwrap();
        assert_eq!(rest.nb_samples, 10 * 1152 - 6350);
        assert_eq!(rest.pts, 6350);
        assert_eq!(dec.sample_rate(), None);
    }

    #[test]
    fn test_解码到输出为止() {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        dec.set_buffer_length(MIN_BUFFER_LENGTH).unwrap();
        let data = stream(10);
        let consumed = dec.decode_until_flush(&data).unwrap();
        // 第 6 帧凑满 6350 个样本
        assert_eq!(consumed, 6 * 417);
        assert_eq!(dec.ready_frames(), 1);
        let consumed2 = dec.decode_until_flush(&data[consumed..]).unwrap();
        assert_eq!(consumed + consumed2, data.len());
    }

    #[test]
    fn test_首帧建立累积缓冲不算输出() {
        let mut dec = Mp3Decoder::new(SampleFormat::F32);
        let data = stream(3);
        assert_eq!(dec.decode_until_flush(&data).unwrap(), data.len());
        assert_eq!(dec.ready_frames(), 0);
        assert_eq!(dec.samples_processed(), 3 * 1152);
    }

    #[test]
    fn test_静音帧输出全零() {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        let frame = silent_frame(MPEG1_STEREO);
        let out = dec.decode_frame(&frame).unwrap();
        assert_eq!(out.len, 1152);
        match out.samples {
            PcmSamples::S16(planes) => {
                assert_eq!(planes.len(), 2);
                assert!(planes[0][..1152].iter().all(|&s| s == 0));
            }
            PcmSamples::F32(_) => panic!("输出格式错误"),
        }
    }

    #[test]
    fn test_极低电平频谱解码为静音() {
        // 反量化后幅度为 1 (相对满幅 2^-20), 合成输出应当全为零
        let spectrum = sparse_spectrum();
        let quiet = layer3_frame(
            MPEG1_MONO,
            &[ChannelData { global_gain: 130, spectrum: &spectrum, scale_factor: None }],
        );
        let planes = decode_repeated(&quiet, 4);
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].len(), 4 * 1152);
        assert!(planes[0].iter().all(|&s| s == 0));

        // 同样的频谱提高增益后有输出, 说明帧内容确实被解码
        let loud = layer3_frame(
            MPEG1_MONO,
            &[ChannelData { global_gain: 170, spectrum: &spectrum, scale_factor: None }],
        );
        let planes = decode_repeated(&loud, 4);
        assert!(planes[0].iter().any(|&s| s != 0));
    }

    #[test]
    fn test_强度立体声按比例因子分配声道() {
        let spectrum = sparse_spectrum();
        let mono = layer3_frame(
            MPEG1_MONO,
            &[ChannelData { global_gain: 170, spectrum: &spectrum, scale_factor: None }],
        );
        let reference = decode_repeated(&mono, 3).remove(0);
        assert!(reference.iter().any(|&s| s != 0));

        let intensity = |scale_factor| {
            layer3_frame(
                MPEG1_INTENSITY,
                &[
                    ChannelData { global_gain: 170, spectrum: &spectrum, scale_factor: None },
                    ChannelData { global_gain: 170, spectrum: &[], scale_factor: Some(scale_factor) },
                ],
            )
        };

        // 位置 6: 全部在左声道
        let planes = decode_repeated(&intensity(6), 3);
        assert_eq!(planes[0], reference);
        assert!(planes[1].iter().all(|&s| s == 0));

        // 位置 0: 全部在右声道
        let planes = decode_repeated(&intensity(0), 3);
        assert!(planes[0].iter().all(|&s| s == 0));
        assert_eq!(planes[1], reference);
    }

    #[test]
    fn test_lsf_帧样本数() {
        let mut dec = Mp3Decoder::new(SampleFormat::F32);
        let frame = silent_frame(MPEG2_MONO);
        assert_eq!(frame.len(), 208);
        let out = dec.decode_frame(&frame).unwrap();
        assert_eq!(out.len, 576);
        assert_eq!(out.header.nb_channels, 1);
        assert_eq!(dec.sample_rate(), Some(22050));
    }

    #[test]
    fn test_逐帧解码_数据不足() {
        let mut dec = Mp3Decoder::default();
        let frame = silent_frame(MPEG1_STEREO);
        assert!(matches!(
            dec.decode_frame(&frame[..100]),
            Err(YinError::NeedMoreData)
        ));
        assert!(matches!(
            dec.decode_frame(&[0u8; 8]),
            Err(YinError::HeaderSync)
        ));
    }

    #[test]
    fn test_连续无效帧报错() {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        let mut data = stream(1);
        for _ in 0..MAX_INVALID_FRAME_COUNT {
            data.extend(corrupt_frame());
        }
        let err = dec.update(&data, false).unwrap_err();
        assert!(err.is_track_fatal());
        // 错误前已累积的样本被输出
        let frame = dec.take_frame().unwrap();
        assert_eq!(frame.nb_samples, 1152);
        assert_eq!(dec.sample_rate(), None);
    }

    #[test]
    fn test_有效帧重置无效计数() {
        let mut dec = Mp3Decoder::new(SampleFormat::S16);
        let mut data = Vec::new();
        for _ in 0..MAX_INVALID_FRAME_COUNT - 1 {
            data.extend(corrupt_frame());
        }
        data.extend(stream(1));
        for _ in 0..MAX_INVALID_FRAME_COUNT - 1 {
            data.extend(corrupt_frame());
        }
        assert!(dec.update(&data, false).is_ok());
    }

    #[test]
    fn test_缓冲时长限制() {
        let mut dec = Mp3Decoder::default();
        dec.set_buffer_length(100.0).unwrap();
        assert_eq!(dec.buffer_length(), MAX_BUFFER_LENGTH);
        dec.set_buffer_length(0.0).unwrap();
        assert_eq!(dec.buffer_length(), MIN_BUFFER_LENGTH);
        assert!(dec.set_buffer_length(f64::NAN).is_err());
    }

    #[test]
    fn test_decoder_trait_流程() {
        let mut dec = Mp3Decoder::default();
        let params = CodecParameters::audio(CodecId::Mp3, SampleFormat::S16);
        dec.open(&params).unwrap();
        assert!(matches!(dec.receive_frame(), Err(YinError::NeedMoreData)));
        dec.send_packet(&Packet::from_data(stream(2))).unwrap();
        assert!(matches!(dec.receive_frame(), Err(YinError::NeedMoreData)));
        dec.send_packet(&Packet::empty()).unwrap();
        let frame = dec.receive_frame().unwrap();
        assert_eq!(frame.nb_samples, 2304);
        assert!(matches!(frame.samples, PcmSamples::S16(_)));
        assert!(matches!(dec.receive_frame(), Err(YinError::Eof)));
    }
}
