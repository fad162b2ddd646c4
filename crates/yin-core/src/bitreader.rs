//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区读取数据, 是 Layer III 解码与帧头解析的基础设施.
//!
//! 热路径读取 (`get_bits` / `get_bits1` / `get_vlc2`) 不做越界检查:
//! 每次从当前位置取 4 个原始字节拼成 32 位窗口再移位, 越过数据末尾的字节按 0 处理.
//! 调用方用 `bits_read()` 与 `bit_size()` 比较来判断是否读过头.
//! 需要显式错误的场合使用带检查的 `read_bits`.

use crate::vlc::VlcTable;
use crate::{YinError, YinResult};

/// 快速路径单次读取的最大位数
pub const MAX_FAST_BITS: u32 = 25;

/// 比特流读取器
///
/// 读取器只持有切片引用与游标, 可按值复制. 位存储器拼接时,
/// 解码器在两个读取器之间转移所有权, 而不是共享可变句柄.
///
/// # 示例
/// ```
/// use yin_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.get_bits(4), 0b1011);
/// assert_eq!(br.get_bits(4), 0b0001);
/// assert_eq!(br.get_bits(8), 0b01010101);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 位 0 所在的字节偏移
    start: usize,
    /// 已读取的位数 (相对 start)
    index: usize,
    /// 有效位数
    size_in_bits: usize,
}

impl<'a> BitReader<'a> {
    /// 创建覆盖整个切片的读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            index: 0,
            size_in_bits: data.len() * 8,
        }
    }

    /// 创建从 `start_byte` 开始、长度为 `bit_len` 位的读取器
    ///
    /// 有效区间外的字节仍可被窗口读取看到 (与前后帧拼接时需要).
    pub fn with_range(data: &'a [u8], start_byte: usize, bit_len: usize) -> Self {
        Self {
            data,
            start: start_byte,
            index: 0,
            size_in_bits: bit_len,
        }
    }

    /// 已读取的总位数
    #[inline]
    pub fn bits_read(&self) -> usize {
        self.index
    }

    /// 有效位数
    #[inline]
    pub fn bit_size(&self) -> usize {
        self.size_in_bits
    }

    /// 剩余可读位数 (读过头时为 0)
    pub fn bits_left(&self) -> usize {
        self.size_in_bits.saturating_sub(self.index)
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.index >= self.size_in_bits
    }

    /// 当前位置对应的源数据字节偏移 (含起始偏移, 向下取整)
    pub fn byte_position(&self) -> usize {
        self.start + (self.index >> 3)
    }

    /// 起始字节偏移
    pub fn start_byte(&self) -> usize {
        self.start
    }

    /// 底层数据
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// 把游标设置到指定位置 (相对起点)
    pub fn set_position(&mut self, bits: usize) {
        self.index = bits;
    }

    /// 从 `byte` 处读取 32 位大端窗口, 越界字节按 0 处理
    #[inline]
    fn window(&self, byte: usize) -> u32 {
        if let Some(w) = self.data.get(byte..byte + 4) {
            return u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
        }
        let mut v = 0u32;
        for k in 0..4 {
            v = (v << 8) | u32::from(self.data.get(byte + k).copied().unwrap_or(0));
        }
        v
    }

    #[inline]
    fn cache_at(&self, index: usize) -> u32 {
        let pos = self.start * 8 + index;
        self.window(pos >> 3) << (pos & 7)
    }

    /// 读取 n 位 (n <= 25), n 为 0 时返回 0
    #[inline]
    pub fn get_bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= MAX_FAST_BITS);
        if n == 0 {
            return 0;
        }
        let v = self.cache_at(self.index) >> (32 - n);
        self.index += n as usize;
        v
    }

    /// 读取单个位
    #[inline]
    pub fn get_bits1(&mut self) -> u32 {
        let pos = self.start * 8 + self.index;
        let byte = self.data.get(pos >> 3).copied().unwrap_or(0);
        self.index += 1;
        u32::from((byte << (pos & 7)) >> 7)
    }

    /// 读取 n 位 (n <= 32)
    pub fn get_bits_long(&mut self, n: u32) -> u32 {
        if n <= MAX_FAST_BITS {
            return self.get_bits(n);
        }
        let high = self.get_bits(16);
        (high << (n - 16)) | self.get_bits(n - 16)
    }

    /// 窥视 n 位 (n <= 25), 不移动游标
    pub fn show_bits(&self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.cache_at(self.index) >> (32 - n)
    }

    /// 读取 n 位有符号整数 (二进制补码)
    pub fn get_sbits(&mut self, n: u32) -> i32 {
        if n == 0 {
            return 0;
        }
        let v = self.get_bits_long(n);
        ((v << (32 - n)) as i32) >> (32 - n)
    }

    /// 跳过 n 位
    #[inline]
    pub fn skip_bits(&mut self, n: usize) {
        self.index += n;
    }

    /// 按有符号位数移动游标 (可回退), 不会退到起点之前
    pub fn skip_bits_long(&mut self, n: isize) {
        self.index = self.index.saturating_add_signed(n);
    }

    /// 对齐到下一个字节边界
    pub fn align(&mut self) {
        self.index += self.index.wrapping_neg() & 7;
    }

    /// 带边界检查的读取 (n <= 32)
    pub fn read_bits(&mut self, n: u32) -> YinResult<u32> {
        if n > 32 {
            return Err(YinError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if n as usize > self.bits_left() {
            return Err(YinError::Eof);
        }
        Ok(self.get_bits_long(n))
    }

    /// 多级 VLC 查表解码
    ///
    /// 先用 `bits` 位索引主表; 码长为负表示间接项, 其码值是子表起点,
    /// 再用 `-len` 位索引子表, 最多 `max_depth` 级. 返回符号, 无效码字返回 -1.
    #[inline]
    pub fn get_vlc2(&mut self, table: &VlcTable, bits: u32, max_depth: u32) -> i32 {
        let entries = table.entries();
        let mut re_index = self.index;
        let mut nb_bits = bits;
        let mut base = 0usize;
        let mut depth = 1;
        loop {
            let index = (self.cache_at(re_index) >> (32 - nb_bits)) as usize + base;
            let (code, n) = entries.get(index).copied().unwrap_or((-1, 0));
            if n < 0 && depth < max_depth {
                // 间接项: 码值为子表起点, -n 为子表索引位数
                re_index += nb_bits as usize;
                nb_bits = u32::from(n.unsigned_abs());
                base = code.max(0) as usize;
                depth += 1;
                continue;
            }
            self.index = re_index.saturating_add_signed(n as isize);
            return i32::from(code);
        }
    }
}
