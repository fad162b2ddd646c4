//! 帧序号到字节偏移的定位表.
//!
//! 定位表有两种来源: VBRI 头自带的目录, 或者从数据起点逐帧扫描.
//! 扫描是惰性且可续的, 只扫到调用方要求的时间为止, 再次调用从上次停下的
//! 位置继续, 不会重复或回退已有条目.

use log::debug;
use yin_core::YinResult;

use super::sync::confirmed_header;
use crate::io::{BlockCache, IoContext};

/// 扫描定位表所需的流参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamLayout {
    /// 第一个音频帧的偏移
    pub data_start: u64,
    /// 音频数据结束偏移
    pub data_end: u64,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 每帧采样数
    pub samples_per_frame: u32,
}

impl StreamLayout {
    /// 帧数换算为秒
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 * f64::from(self.samples_per_frame) / f64::from(self.sample_rate)
    }
}

/// MP3 定位表
#[derive(Debug, Clone, PartialEq)]
pub struct Mp3SeekTable {
    /// 已知帧数
    frames: u64,
    /// 第 i 项为第 `i * frames_per_entry` 帧的偏移
    table: Vec<u64>,
    /// 每项间隔的帧数
    frames_per_entry: u64,
    /// 已覆盖的时长 (秒)
    filled_until: f64,
    /// 下次扫描的起始偏移
    next_offset: u64,
    /// 已扫描到数据末尾
    complete: bool,
    /// 来自 VBRI 目录
    is_from_metadata: bool,
}

impl Mp3SeekTable {
    /// 每帧一项的空定位表
    pub fn new() -> Self {
        Self::with_stride(1)
    }

    /// 每 `frames_per_entry` 帧一项的空定位表
    pub fn with_stride(frames_per_entry: u64) -> Self {
        Self {
            frames: 0,
            table: Vec::new(),
            frames_per_entry: frames_per_entry.max(1),
            filled_until: 0.0,
            next_offset: 0,
            complete: false,
            is_from_metadata: false,
        }
    }

    /// 由 VBRI 目录构造
    ///
    /// `sizes` 为各段的 (未缩放) 字节数, 第 0 项偏移为 `data_start`.
    pub fn from_vbri(
        layout: &StreamLayout,
        frames: u64,
        frames_per_entry: u64,
        scale: u64,
        sizes: impl IntoIterator<Item = u64>,
    ) -> Self {
        let mut table = vec![layout.data_start];
        let mut offset = layout.data_start;
        for size in sizes {
            offset = offset.saturating_add(size.saturating_mul(scale));
            table.push(offset);
        }
        Self {
            frames,
            table,
            frames_per_entry: frames_per_entry.max(1),
            filled_until: layout.frames_to_seconds(frames),
            next_offset: offset,
            complete: true,
            is_from_metadata: true,
        }
    }

    /// 已知帧数
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 每项间隔的帧数
    pub fn frames_per_entry(&self) -> u64 {
        self.frames_per_entry
    }

    /// 已覆盖的时长 (秒)
    pub fn filled_until(&self) -> f64 {
        self.filled_until
    }

    /// 是否已扫描到数据末尾
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// 是否来自 VBRI 目录
    pub fn is_from_metadata(&self) -> bool {
        self.is_from_metadata
    }

    /// 全部条目 (偏移)
    pub fn entries(&self) -> &[u64] {
        &self.table
    }

    /// 最接近 `frame` 且有条目的帧序号
    pub fn closest_frame_of(&self, frame: u64) -> u64 {
        let frame = frame.min(self.frames);
        let index = (frame as f64 / self.frames_per_entry as f64).round() as u64;
        let last = self.table.len().saturating_sub(1) as u64;
        index.min(last) * self.frames_per_entry
    }

    /// `frame` 最接近的条目偏移, 表为空时返回 None
    pub fn offset_of_frame(&self, frame: u64) -> Option<u64> {
        let index = self.closest_frame_of(frame) / self.frames_per_entry;
        self.table.get(index as usize).copied()
    }

    /// 扫描直到覆盖 `time` 秒, 或到达数据末尾
    ///
    /// 可重复调用; 每次从上次停下的位置继续.
    pub fn fill_until(
        &mut self,
        time: f64,
        layout: &StreamLayout,
        io: &mut IoContext,
    ) -> YinResult<()> {
        if self.complete || self.filled_until >= time {
            return Ok(());
        }
        let frame_rate = f64::from(layout.sample_rate) / f64::from(layout.samples_per_frame);
        let max_frames = (time * frame_rate).ceil() as u64;
        let mut pos = if self.frames == 0 {
            layout.data_start
        } else {
            self.next_offset
        };
        let mut cache = BlockCache::default();

        while self.frames < max_frames {
            if pos + 4 > layout.data_end {
                self.complete = true;
                break;
            }
            let Some(header) = confirmed_header(&mut cache, io, pos, layout.data_end)? else {
                pos += 1;
                continue;
            };
            if self.frames % self.frames_per_entry == 0 {
                self.table.push(pos);
            }
            self.frames += 1;
            pos += header.frame_size as u64;
        }

        self.next_offset = pos;
        self.filled_until = layout.frames_to_seconds(self.frames);
        debug!(
            "MP3: 定位表扫描到第 {} 帧 ({:.3}s){}",
            self.frames,
            self.filled_until,
            if self.complete { ", 已到末尾" } else { "" }
        );
        Ok(())
    }
}

impl Default for Mp3SeekTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 44.1kHz 128kbps 立体声, 417 字节
    const HEADER: u32 = 0xFFFB_9000;

    fn stream(prefix: usize, n: usize) -> (Vec<u8>, StreamLayout) {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&HEADER.to_be_bytes());
        let mut data = vec![0x55u8; prefix];
        for _ in 0..n {
            data.extend_from_slice(&frame);
        }
        let layout = StreamLayout {
            data_start: prefix as u64,
            data_end: data.len() as u64,
            sample_rate: 44100,
            samples_per_frame: 1152,
        };
        (data, layout)
    }

    #[test]
    fn test_扫描可续且单调() {
        let (data, layout) = stream(7, 50);
        let mut io = IoContext::from_memory(data);
        let mut table = Mp3SeekTable::new();

        table.fill_until(0.5, &layout, &mut io).unwrap();
        let first: Vec<u64> = table.entries().to_vec();
        assert_eq!(first.len() as u64, table.frames());
        assert_eq!(first[0], 7);
        assert!(first.windows(2).all(|w| w[1] == w[0] + 417));
        assert!(table.filled_until() >= 0.5);

        // 更早的时间不触发扫描
        table.fill_until(0.1, &layout, &mut io).unwrap();
        assert_eq!(table.entries(), first.as_slice());

        table.fill_until(1.0, &layout, &mut io).unwrap();
        assert!(table.entries().starts_with(&first));
        assert!(table.entries().windows(2).all(|w| w[1] > w[0]));
        assert!(!table.is_complete());
    }

    #[test]
    fn test_扫描到末尾() {
        let (data, layout) = stream(0, 10);
        let mut io = IoContext::from_memory(data);
        let mut table = Mp3SeekTable::new();
        table.fill_until(100.0, &layout, &mut io).unwrap();
        assert_eq!(table.frames(), 10);
        assert!(table.is_complete());
        assert_eq!(table.offset_of_frame(3), Some(3 * 417));
        assert_eq!(table.closest_frame_of(50), 9);
    }

    #[test]
    fn test_跨步条目() {
        let (data, layout) = stream(0, 20);
        let mut io = IoContext::from_memory(data);
        let mut table = Mp3SeekTable::with_stride(4);
        table.fill_until(100.0, &layout, &mut io).unwrap();
        assert_eq!(table.frames(), 20);
        assert_eq!(table.entries().len(), 5);
        assert_eq!(table.closest_frame_of(5), 4);
        assert_eq!(table.closest_frame_of(7), 8);
        assert_eq!(table.offset_of_frame(7), Some(8 * 417));
    }

    #[test]
    fn test_vbri_目录() {
        let layout = StreamLayout {
            data_start: 1000,
            data_end: 100_000,
            sample_rate: 44100,
            samples_per_frame: 1152,
        };
        let table = Mp3SeekTable::from_vbri(&layout, 300, 100, 2, [500, 700, 600]);
        assert!(table.is_from_metadata());
        assert!(table.is_complete());
        assert_eq!(table.entries(), &[1000, 2000, 3400, 4600]);
        assert_eq!(table.closest_frame_of(140), 100);
        assert_eq!(table.offset_of_frame(260), Some(4600));
    }

    #[test]
    fn test_vbri_目录累加不溢出() {
        let layout = StreamLayout {
            data_start: 1000,
            data_end: 100_000,
            sample_rate: 44100,
            samples_per_frame: 1152,
        };
        let table = Mp3SeekTable::from_vbri(&layout, 300, 100, 0xFFFF, [u64::MAX, u64::MAX, 5]);
        assert_eq!(table.entries(), &[1000, u64::MAX, u64::MAX, u64::MAX]);
    }
}
