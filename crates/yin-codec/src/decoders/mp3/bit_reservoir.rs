//! MP3 比特储备库 (Bit Reservoir)
//!
//! 负责缓存前几帧剩余的 main_data, 并在解码时把储备库与当前帧拼接成
//! 连续的比特流. 拼接通过在两个 `BitReader` 之间转移所有权实现:
//! 先读储备库, 读到其末尾后切换到当前帧的读取器.

use std::ops::Range;

use yin_core::BitReader;

/// 可回溯的最大字节数
pub const BACKSTEP_SIZE: usize = 512;
/// 拼接时额外复制的当前帧字节数 (允许窗口读取越过储备库末尾)
pub const EXTRABYTES: usize = 24;
/// 储备库容量
pub const RESERVOIR_CAPACITY: usize = 2 * BACKSTEP_SIZE + EXTRABYTES;

/// 储备库字节缓冲
#[derive(Debug, Clone)]
pub struct BitReservoir {
    buf: [u8; RESERVOIR_CAPACITY],
    len: usize,
}

impl Default for BitReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl BitReservoir {
    pub fn new() -> Self {
        Self {
            buf: [0; RESERVOIR_CAPACITY],
            len: 0,
        }
    }

    /// 当前有效字节数
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 为 `main_data_begin` 字节的回溯做准备
    ///
    /// 储备不足时把有效长度补到 `main_data_begin` (不足部分内容未定义),
    /// 并在末尾追加当前帧 `frame[pos..]` 的前 `EXTRABYTES` 字节.
    pub fn prepare(&mut self, main_data_begin: usize, frame: &[u8], pos: usize) {
        self.len = self.len.max(main_data_begin);
        let dst = &mut self.buf[self.len..self.len + EXTRABYTES];
        let src = frame.get(pos..).unwrap_or(&[]);
        let n = src.len().min(EXTRABYTES);
        dst[..n].copy_from_slice(&src[..n]);
        dst[n..].fill(0);
    }

    /// 覆盖最后 `main_data_begin` 字节的读取器
    pub fn reader(&self, main_data_begin: usize) -> BitReader<'_> {
        BitReader::with_range(&self.buf, self.len - main_data_begin, main_data_begin * 8)
    }

    /// 只保留 `keep` 范围内的字节 (移动到开头), None 表示清空
    pub fn retain(&mut self, keep: Option<Range<usize>>) {
        match keep {
            Some(range) if range.end <= RESERVOIR_CAPACITY && range.len() <= BACKSTEP_SIZE => {
                let n = range.len();
                self.buf.copy_within(range, 0);
                self.len = n;
            }
            _ => self.len = 0,
        }
    }

    /// 追加当前帧末尾 `n` 字节
    pub fn append_tail(&mut self, frame: &[u8], n: usize) {
        let n = n
            .min(frame.len())
            .min(BACKSTEP_SIZE)
            .min(2 * BACKSTEP_SIZE - self.len);
        let tail = &frame[frame.len() - n..];
        self.buf[self.len..self.len + n].copy_from_slice(tail);
        self.len += n;
    }
}

/// Huffman 解码的终止位置
#[derive(Debug, Clone, Copy)]
pub struct HuffPos {
    /// 当前读取器内的结束位置
    pub end_pos: isize,
    /// 本 granule 数据的结束位置
    pub end_pos2: isize,
}

/// 储备库与当前帧拼接的读取器
#[derive(Debug, Clone, Copy)]
pub struct SplicedReader<'a> {
    /// 正在读取的比特流
    pub gb: BitReader<'a>,
    /// 储备库读完后接续的当前帧读取器
    in_gb: Option<BitReader<'a>>,
}

impl<'a> SplicedReader<'a> {
    pub fn new(reservoir: BitReader<'a>, frame: BitReader<'a>) -> Self {
        Self {
            gb: reservoir,
            in_gb: Some(frame),
        }
    }

    /// 仍在读储备库
    pub fn is_spliced(&self) -> bool {
        self.in_gb.is_some()
    }

    /// 当前读取位置 (位)
    #[inline]
    pub fn pos(&self) -> isize {
        self.gb.bits_read() as isize
    }

    /// 读到储备库末尾时切换到当前帧, 返回切换后的位置
    pub fn switch_buffer(&mut self, pos: isize, p: &mut HuffPos) -> Option<isize> {
        if pos < self.gb.bit_size() as isize {
            return None;
        }
        let frame = self.in_gb.take()?;
        self.gb = frame;
        self.gb.skip_bits_long(pos - p.end_pos);
        let count = self.pos();
        p.end_pos2 = p.end_pos2 + count - pos;
        p.end_pos = p.end_pos2;
        Some(count)
    }

    /// 拆出 (当前读取器, 未切换时的当前帧读取器)
    pub fn into_parts(self) -> (BitReader<'a>, Option<BitReader<'a>>) {
        (self.gb, self.in_gb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_储备库_回溯与追加() {
        let mut r = BitReservoir::new();
        let frame: Vec<u8> = (0..100u8).collect();
        r.append_tail(&frame, 10);
        assert_eq!(r.len(), 10);

        r.prepare(4, &frame, 50);
        let mut gb = r.reader(4);
        // 最后 4 字节为 96..100
        assert_eq!(gb.get_bits(8), 96);
        gb.skip_bits(24);
        assert!(gb.is_eof());
        // 越过末尾可见当前帧字节
        assert_eq!(gb.get_bits(8), 50);
    }

    #[test]
    fn test_储备库_保留范围() {
        let mut r = BitReservoir::new();
        let frame: Vec<u8> = (0..200u8).collect();
        r.append_tail(&frame, 100);
        r.retain(Some(90..100));
        assert_eq!(r.len(), 10);
        let mut gb = r.reader(10);
        assert_eq!(gb.get_bits(8), 190);
        r.retain(None);
        assert!(r.is_empty());
    }

    #[test]
    fn test_储备库_容量上限() {
        let mut r = BitReservoir::new();
        let frame = vec![7u8; 2000];
        r.append_tail(&frame, 2000);
        assert_eq!(r.len(), BACKSTEP_SIZE);
        r.append_tail(&frame, 2000);
        assert_eq!(r.len(), 2 * BACKSTEP_SIZE);
        r.prepare(511, &frame, 0);
        assert!(r.len() + EXTRABYTES <= RESERVOIR_CAPACITY);
    }

    #[test]
    fn test_拼接读取器_切换到当前帧() {
        let reservoir = [0xAAu8; 2];
        let frame = [0x0Fu8, 0xF0];
        let mut s = SplicedReader::new(
            BitReader::with_range(&reservoir, 0, 16),
            BitReader::new(&frame),
        );
        let mut p = HuffPos {
            end_pos: 16,
            end_pos2: 20,
        };
        s.gb.skip_bits(16);
        assert!(s.is_spliced());
        let pos = s.switch_buffer(16, &mut p).unwrap();
        assert!(!s.is_spliced());
        assert_eq!(pos, 0);
        // 剩余 4 位在当前帧
        assert_eq!(p.end_pos2, 4);
        assert_eq!(p.end_pos, 4);
        assert_eq!(s.gb.get_bits(4), 0);
        // 已切换后不再切换
        assert!(s.switch_buffer(100, &mut p).is_none());
    }
}
