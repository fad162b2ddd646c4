//! 按时间定位到字节偏移.
//!
//! 偏移的来源依次为: CBR 线性换算, Xing 目录插值, 定位表.
//! 目标帧会向前退若干帧, 让位存储器在真正要播放的帧之前重新填满;
//! 这些预热帧解码出的样本计入 `samples_to_skip`.

use log::debug;
use yin_core::{YinError, YinResult};

use super::metadata::Mp3Metadata;
use super::seek_table::Mp3SeekTable;
use crate::demuxer::SeekResult;
use crate::io::IoContext;

/// 预热位存储器的帧数
pub const RESERVOIR_WARMUP_FRAMES: u64 = 9;

/// 定位到 `time` 秒
///
/// 超出 `[0, duration]` 的时间会被截断 (只记录日志, 不报错).
/// 必要时会续扫定位表.
pub fn seek(meta: &mut Mp3Metadata, time: f64, io: &mut IoContext) -> YinResult<SeekResult> {
    let requested = time;
    let time = if time.is_finite() {
        time.clamp(0.0, meta.duration)
    } else {
        0.0
    };
    if time != requested {
        debug!(
            "{}, 已截断",
            YinError::SeekOutOfRange {
                requested,
                duration: meta.duration,
            }
        );
    }

    let spf = u64::from(meta.samples_per_frame);
    let frame_duration = f64::from(meta.samples_per_frame) / f64::from(meta.sample_rate);
    let frames = (meta.duration * f64::from(meta.sample_rate) / spf as f64) as u64;
    if frames == 0 || meta.duration <= 0.0 {
        return Ok(start_of_stream(meta, 0));
    }

    let mut frame = ((time / meta.duration) * frames as f64) as u64;
    let mut current_time = frame as f64 * frame_duration;
    let mut target = frame.saturating_sub(RESERVOIR_WARMUP_FRAMES);
    let mut samples_to_skip = (frame - target) * spf;
    let data_len = meta.data_end.saturating_sub(meta.data_start) as f64;

    let offset = if !meta.vbr {
        meta.data_start + (target as f64 * meta.average_frame_size) as u64
    } else if let Some(toc) = meta.toc {
        // Xing 目录只有 1% 的精度, 直接从目录点开始, 跳过其第一帧
        let percent = ((frame as f64 / frames as f64) * 100.0).round();
        frame = ((percent / 100.0) * frames as f64) as u64;
        current_time = (frame + 1) as f64 * frame_duration;
        samples_to_skip = spf;
        target = frame;
        let index = (percent as usize).min(99);
        meta.data_start + (f64::from(toc[index]) / 256.0 * data_len) as u64
    } else {
        let layout = meta.layout();
        let table = meta.seek_table.get_or_insert_with(Mp3SeekTable::new);
        table.fill_until(time + frame_duration, &layout, io)?;
        if table.is_from_metadata() {
            // VBRI 目录点之前一般没有位存储器依赖
            frame = table.closest_frame_of(frame);
            current_time = (frame + 1) as f64 * frame_duration;
            samples_to_skip = spf;
            target = frame;
            table.offset_of_frame(frame).unwrap_or(meta.data_start)
        } else {
            target = table.closest_frame_of(target);
            samples_to_skip = frame.saturating_sub(target) * spf;
            table.offset_of_frame(target).unwrap_or(meta.data_start)
        }
    };

    if target == 0 {
        return Ok(start_of_stream(meta, samples_to_skip).with_time(current_time));
    }

    let result = SeekResult {
        time: current_time,
        offset: offset.clamp(meta.data_start, meta.data_end),
        samples_to_skip,
        frame: target,
    };
    debug!(
        "MP3: 定位 {:.3}s -> 帧 {} @ {}, 跳过 {} 样本",
        time, result.frame, result.offset, result.samples_to_skip
    );
    Ok(result)
}

/// 从流起点开始解码的结果, 编码器延迟计入跳过的样本
fn start_of_stream(meta: &Mp3Metadata, warmup_samples: u64) -> SeekResult {
    SeekResult {
        time: 0.0,
        offset: meta.data_start,
        samples_to_skip: warmup_samples + u64::from(meta.encoder_delay),
        frame: 0,
    }
}

impl SeekResult {
    fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demuxers::mp3::{DemuxOptions, demux};

    const HEADER: u32 = 0xFFFB_9000;
    const FRAME: u64 = 417;

    fn cbr_stream(frames: usize) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME as usize];
        frame[..4].copy_from_slice(&HEADER.to_be_bytes());
        frame.repeat(frames)
    }

    fn open(data: Vec<u8>) -> (Mp3Metadata, IoContext) {
        let mut io = IoContext::from_memory(data);
        let meta = demux(&mut io, &DemuxOptions::default()).unwrap();
        (meta, io)
    }

    #[test]
    fn test_cbr_线性定位() {
        let (mut meta, mut io) = open(cbr_stream(400));
        let r = seek(&mut meta, 5.0, &mut io).unwrap();
        let frame = ((5.0 / meta.duration) * (meta.frames as f64)) as u64;
        assert_eq!(r.frame, frame - RESERVOIR_WARMUP_FRAMES);
        // CBR 按平均帧长换算, 而非实际的 417 字节
        assert_eq!(r.offset, (r.frame as f64 * meta.average_frame_size) as u64);
        assert_eq!(r.samples_to_skip, RESERVOIR_WARMUP_FRAMES * 1152);
        assert!((r.time - frame as f64 * 1152.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn test_起点附近计入编码器延迟() {
        let (mut meta, mut io) = open(cbr_stream(400));
        let r = seek(&mut meta, 0.1, &mut io).unwrap();
        assert_eq!(r.frame, 0);
        assert_eq!(r.offset, 0);
        // 0.1s 约为第 3 帧: 预热 3 帧加上默认的 576 延迟
        let frame = ((0.1 / meta.duration) * (meta.frames as f64)) as u64;
        assert_eq!(r.samples_to_skip, frame * 1152 + 576);
    }

    #[test]
    fn test_越界时间被截断() {
        let (mut meta, mut io) = open(cbr_stream(400));
        let before = seek(&mut meta, -3.0, &mut io).unwrap();
        assert_eq!(before.frame, 0);
        assert_eq!(before.time, 0.0);
        let after = seek(&mut meta, 1e9, &mut io).unwrap();
        assert!(after.offset <= meta.data_end);
        assert!(after.time <= meta.duration + 1152.0 / 44100.0);
    }

    #[test]
    fn test_xing_目录插值() {
        let (mut meta, mut io) = open(cbr_stream(400));
        meta.vbr = true;
        let mut toc = [0u8; 100];
        for (i, v) in toc.iter_mut().enumerate() {
            *v = (i * 256 / 100) as u8;
        }
        meta.toc = Some(toc);
        let half = meta.duration / 2.0;
        let r = seek(&mut meta, half, &mut io).unwrap();
        assert_eq!(r.samples_to_skip, 1152);
        let expected = (f64::from(toc[50]) / 256.0 * (meta.data_end - meta.data_start) as f64) as u64;
        assert_eq!(r.offset, expected);
        assert_eq!(r.frame, meta.frames / 2);
    }

    #[test]
    fn test_vbr_扫描定位表() {
        let (mut meta, mut io) = open(cbr_stream(400));
        meta.vbr = true;
        assert!(meta.seek_table.is_none());
        let r = seek(&mut meta, 4.0, &mut io).unwrap();
        let table = meta.seek_table.as_ref().unwrap();
        assert!(table.filled_until() >= 4.0);
        assert!(!table.is_from_metadata());
        assert_eq!(r.offset, r.frame * FRAME);
        assert_eq!(r.samples_to_skip, RESERVOIR_WARMUP_FRAMES * 1152);
    }
}
