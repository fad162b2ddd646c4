//! 多级 VLC (变长码) 查找表.
//!
//! 由码长与码字数组构建扁平表: 长度不超过 `table_nb_bits` 的码字直接写入
//! `(符号, 码长)`; 更长的码字按前缀分组, 主表项写入负码长作为间接标记,
//! 并为该前缀递归分配子表. 表在进程内只构建一次, 由所有解码器共享.

/// VLC 查找表
#[derive(Debug, Clone)]
pub struct VlcTable {
    /// 主表索引位数
    bits: u32,
    /// 表项 (符号或子表起点, 码长; 码长为负表示间接)
    table: Vec<(i16, i16)>,
}

impl VlcTable {
    /// 由码长与码字构建查找表
    ///
    /// `lens[i]` 与 `codes[i]` 描述符号 `i`, 码长为 0 的符号不参与编码.
    pub fn build(nb_bits: u32, lens: &[u8], codes: &[u32]) -> Self {
        let mut vlc = Self {
            bits: nb_bits,
            table: Vec::new(),
        };
        vlc.build_table(nb_bits, lens, codes, 0, 0);
        vlc
    }

    /// 主表索引位数
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// 全部表项
    pub fn entries(&self) -> &[(i16, i16)] {
        &self.table
    }

    fn alloc_table(&mut self, size: usize) -> usize {
        let index = self.table.len();
        self.table.resize(index + size, (-1, 0));
        index
    }

    fn build_table(
        &mut self,
        table_nb_bits: u32,
        lens: &[u8],
        codes: &[u32],
        code_prefix: u32,
        n_prefix: u32,
    ) -> usize {
        let table_size = 1usize << table_nb_bits;
        let base = self.alloc_table(table_size);

        for (sym, (&len, &code)) in lens.iter().zip(codes).enumerate() {
            let len = u32::from(len);
            if len <= n_prefix {
                continue;
            }
            let n = len - n_prefix;
            if code >> n != code_prefix {
                continue;
            }
            if n <= table_nb_bits {
                let j = ((code << (table_nb_bits - n)) as usize) & (table_size - 1);
                let nb = 1usize << (table_nb_bits - n);
                for slot in &mut self.table[base + j..base + j + nb] {
                    debug_assert_eq!(slot.1, 0, "VLC 码字冲突");
                    *slot = (sym as i16, n as i16);
                }
            } else {
                let n = n - table_nb_bits;
                let j = ((code >> n) as usize) & (table_size - 1);
                let slot = &mut self.table[base + j];
                let n1 = (-slot.1).max(n as i16);
                slot.1 = -n1;
            }
        }

        for i in 0..table_size {
            let n = self.table[base + i].1;
            if n < 0 {
                let mut sub_bits = u32::from(n.unsigned_abs());
                if sub_bits > table_nb_bits {
                    sub_bits = table_nb_bits;
                    self.table[base + i].1 = -(sub_bits as i16);
                }
                let index = self.build_table(
                    sub_bits,
                    lens,
                    codes,
                    (code_prefix << table_nb_bits) | i as u32,
                    n_prefix + table_nb_bits,
                );
                self.table[base + i].0 = index as i16;
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitReader;

    /// 码表: A=0, B=10, C=110, D=1110, E=11110, F=11111
    fn sample_table(bits: u32) -> VlcTable {
        let lens = [1u8, 2, 3, 4, 5, 5];
        let codes = [0b0u32, 0b10, 0b110, 0b1110, 0b11110, 0b11111];
        VlcTable::build(bits, &lens, &codes)
    }

    fn decode_all(table: &VlcTable, bits: u32, depth: u32, data: &[u8], count: usize) -> Vec<i32> {
        let mut br = BitReader::new(data);
        (0..count).map(|_| br.get_vlc2(table, bits, depth)).collect()
    }

    #[test]
    fn test_vlc_单级表() {
        let table = sample_table(5);
        assert_eq!(table.entries().len(), 32);
        // 0 10 110 1110 11110 11111 0 => 0x5BBDF_
        let data = [0b0101_1011, 0b1011_1101, 0b1111_0000];
        let syms = decode_all(&table, 5, 1, &data, 7);
        assert_eq!(syms, vec![0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_vlc_二级表与单级一致() {
        let table = sample_table(2);
        // 主表 4 项, 前缀 11 需要子表
        assert!(table.entries()[3].1 < 0);
        assert!(table.entries().len() > 4);
        let data = [0b0101_1011, 0b1011_1101, 0b1111_0000];
        let syms = decode_all(&table, 2, 3, &data, 7);
        assert_eq!(syms, vec![0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn test_vlc_读取位数等于码长() {
        let table = sample_table(2);
        let data = [0b1111_0000];
        let mut br = BitReader::new(&data);
        assert_eq!(br.get_vlc2(&table, 2, 3), 4);
        assert_eq!(br.bits_read(), 5);
    }

    #[test]
    fn test_vlc_未使用前缀返回无效() {
        // 只有码字 0 和 10, 前缀 11 未定义
        let table = VlcTable::build(2, &[1, 2], &[0, 0b10]);
        let data = [0b1100_0000];
        let mut br = BitReader::new(&data);
        assert_eq!(br.get_vlc2(&table, 2, 1), -1);
        assert_eq!(br.bits_read(), 0);
    }
}
