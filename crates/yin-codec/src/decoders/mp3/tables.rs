//! MP3 Layer III 常量表
//!
//! 静态表直接来自 ISO/IEC 11172-3 与 13818-3; 依赖浮点运算的表
//! (反量化、立体声、抗混叠、IMDCT 窗、合成窗) 在首次使用时构建一次.

use std::sync::OnceLock;

use super::fixed::{FRAC_BITS, WFRAC_BITS, fixhr, fixr};

/// 4/3 次幂表项数
pub const TABLE_4_3_SIZE: usize = (8191 + 16) * 4;

/// 码率表 (kbps), [lsf][bitrate_index]
pub static BITRATE_TAB: [u16; 30] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];

/// MPEG-1 采样率表
pub static FREQ_TAB: [u32; 3] = [
    44100, 48000, 32000,
];

/// 合成窗原型 (257 项, 其余按对称展开)
pub static ENWINDOW: [i32; 257] = [
    0, -1, -1, -1, -1, -1, -1, -2,
    -2, -2, -2, -3, -3, -4, -4, -5,
    -5, -6, -7, -7, -8, -9, -10, -11,
    -13, -14, -16, -17, -19, -21, -24, -26,
    -29, -31, -35, -38, -41, -45, -49, -53,
    -58, -63, -68, -73, -79, -85, -91, -97,
    -104, -111, -117, -125, -132, -139, -147, -154,
    -161, -169, -176, -183, -190, -196, -202, -208,
    213, 218, 222, 225, 227, 228, 228, 227,
    224, 221, 215, 208, 200, 189, 177, 163,
    146, 127, 106, 83, 57, 29, -2, -36,
    -72, -111, -153, -197, -244, -294, -347, -401,
    -459, -519, -581, -645, -711, -779, -848, -919,
    -991, -1064, -1137, -1210, -1283, -1356, -1428, -1498,
    -1567, -1634, -1698, -1759, -1817, -1870, -1919, -1962,
    -2001, -2032, -2057, -2075, -2085, -2087, -2080, -2063,
    2037, 2000, 1952, 1893, 1822, 1739, 1644, 1535,
    1414, 1280, 1131, 970, 794, 605, 402, 185,
    -45, -288, -545, -814, -1095, -1388, -1692, -2006,
    -2330, -2663, -3004, -3351, -3705, -4063, -4425, -4788,
    -5153, -5517, -5879, -6237, -6589, -6935, -7271, -7597,
    -7910, -8209, -8491, -8755, -8998, -9219, -9416, -9585,
    -9727, -9838, -9916, -9959, -9966, -9935, -9863, -9750,
    -9592, -9389, -9139, -8840, -8492, -8092, -7640, -7134,
    6574, 5959, 5288, 4561, 3776, 2935, 2037, 1082,
    70, -998, -2122, -3300, -4533, -5818, -7154, -8540,
    -9975, -11455, -12980, -14548, -16155, -17799, -19478, -21189,
    -22929, -24694, -26482, -28289, -30112, -31947, -33791, -35640,
    -37489, -39336, -41176, -43006, -44821, -46617, -48390, -50137,
    -51853, -53534, -55178, -56778, -58333, -59838, -61289, -62684,
    -64019, -65290, -66494, -67629, -68692, -69679, -70590, -71420,
    -72169, -72835, -73415, -73908, -74313, -74630, -74856, -74992,
    75038,
];

/// 比例因子位宽, [2][16]
pub static SLEN_TABLE: [u8; 32] = [
    0, 0, 0, 0, 3, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4,
    0, 1, 2, 3, 0, 1, 2, 3, 1, 2, 3, 1, 2, 3, 2, 3,
];

/// LSF 比例因子分组长度, [6][3][4]
pub static LSF_NSF_TABLE: [u8; 72] = [
    6, 5, 5, 5, 9, 9, 9, 9, 6, 9, 9, 9,
    6, 5, 7, 3, 9, 9, 12, 6, 6, 9, 12, 6,
    11, 10, 0, 0, 18, 18, 0, 0, 15, 18, 0, 0,
    7, 7, 7, 0, 12, 12, 12, 0, 6, 15, 12, 0,
    6, 6, 6, 3, 12, 9, 9, 6, 6, 12, 9, 6,
    8, 8, 5, 0, 15, 12, 9, 0, 6, 18, 9, 0,
];

/// 长块频带宽度, [9][22]
pub static BAND_SIZE_LONG: [u8; 198] = [
    4, 4, 4, 4, 4, 4, 6, 6, 8, 8, 10, 12, 16, 20, 24, 28, 34, 42, 50, 54, 76, 158,
    4, 4, 4, 4, 4, 4, 6, 6, 6, 8, 10, 12, 16, 18, 22, 28, 34, 40, 46, 54, 54, 192,
    4, 4, 4, 4, 4, 4, 6, 6, 8, 10, 12, 16, 20, 24, 30, 38, 46, 56, 68, 84, 102, 26,
    6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54,
    6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 18, 22, 26, 32, 38, 46, 52, 64, 70, 76, 36,
    6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54,
    6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54,
    6, 6, 6, 6, 6, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32, 38, 46, 52, 60, 68, 58, 54,
    12, 12, 12, 12, 12, 12, 16, 20, 24, 28, 32, 40, 48, 56, 64, 76, 90, 2, 2, 2, 2, 2,
];

/// 短块频带宽度, [9][13]
pub static BAND_SIZE_SHORT: [u8; 117] = [
    4, 4, 4, 4, 6, 8, 10, 12, 14, 18, 22, 30, 56,
    4, 4, 4, 4, 6, 6, 10, 12, 14, 16, 20, 26, 66,
    4, 4, 4, 4, 6, 8, 12, 16, 20, 26, 34, 42, 12,
    4, 4, 4, 6, 6, 8, 10, 14, 18, 26, 32, 42, 18,
    4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 32, 44, 12,
    4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18,
    4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18,
    4, 4, 4, 6, 8, 10, 12, 14, 18, 24, 30, 40, 18,
    8, 8, 8, 12, 16, 20, 24, 28, 36, 2, 2, 2, 26,
];

/// 预加重表, [2][22]
pub static PRETAB: [u8; 44] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 3, 2, 0,
];

/// 抗混叠系数 ci
pub static CI_TABLE: [f32; 8] = [
    -0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037,
];

/// 大值区表号到 (VLC 表号, linbits) 的映射, [32][2]
pub static HUFF_DATA: [u8; 64] = [
    0, 0, 1, 0, 2, 0, 3, 0, 0, 0, 4, 0, 5, 0, 6, 0,
    7, 0, 8, 0, 9, 0, 10, 0, 11, 0, 12, 0, 0, 0, 13, 0,
    14, 1, 14, 2, 14, 3, 14, 4, 14, 6, 14, 8, 14, 10, 14, 13,
    15, 4, 15, 5, 15, 6, 15, 7, 15, 8, 15, 9, 15, 11, 15, 13,
];

// IMDCT 常量
pub const C1: i32 = fixhr(0.984_807_753_012_208_059_36 / 2.0);
pub const C2: i32 = fixhr(0.939_692_620_785_908_384_05 / 2.0);
pub const C3: i32 = fixhr(0.866_025_403_784_438_646_76 / 2.0);
pub const C4: i32 = fixhr(0.766_044_443_118_978_035_20 / 2.0);
pub const C5: i32 = fixhr(0.642_787_609_686_539_326_32 / 2.0);
pub const C7: i32 = fixhr(0.342_020_143_325_668_733_04 / 2.0);
pub const C8: i32 = fixhr(0.173_648_177_666_930_348_85 / 2.0);

/// 36 点 IMDCT 的蝶形系数 (Q15)
pub const ICOS36: [i32; 9] = [
    fixr(0.501_909_918_771_673_694_79),
    fixr(0.517_638_090_205_041_524_69),
    fixr(0.551_688_959_481_245_878_24),
    fixr(0.610_387_294_380_728_034_16),
    fixr(0.707_106_781_186_547_524_39),
    fixr(0.871_723_397_810_549_009_91),
    fixr(1.183_100_791_576_249_258_96),
    fixr(1.931_851_652_578_136_573_49),
    fixr(5.736_856_622_834_927_564_61),
];

/// 36 点 IMDCT 的蝶形系数 (Q32, 已按量级预除)
pub const ICOS36H: [i32; 8] = [
    fixhr(0.501_909_918_771_673_694_79 / 2.0),
    fixhr(0.517_638_090_205_041_524_69 / 2.0),
    fixhr(0.551_688_959_481_245_878_24 / 2.0),
    fixhr(0.610_387_294_380_728_034_16 / 2.0),
    fixhr(0.707_106_781_186_547_524_39 / 2.0),
    fixhr(0.871_723_397_810_549_009_91 / 2.0),
    fixhr(1.183_100_791_576_249_258_96 / 4.0),
    fixhr(1.931_851_652_578_136_573_49 / 4.0),
];

/// 运行期构建的派生表
pub struct Tables {
    /// 合成窗 (512 项, Q14)
    pub window: [i32; 512],
    /// 长块频带起点, [9][23]
    pub band_index_long: [u16; 9 * 23],
    /// x^(4/3) 尾数
    pub table_4_3_value: Vec<u32>,
    /// x^(4/3) 指数
    pub table_4_3_exp: Vec<i8>,
    /// 小值 (x < 16) 反量化结果, [512][16]
    pub expval_table: Vec<u32>,
    /// x = 1 时的反量化结果
    pub exp_table: [u32; 512],
    /// MPEG-1 强度立体声系数, [2][16]
    pub is_table: [i32; 32],
    /// LSF 强度立体声系数, [2][2][16]
    pub is_table_lsf: [[i32; 32]; 2],
    /// 抗混叠蝶形系数, [8][4]
    pub csa_table: [i32; 32],
    /// IMDCT 窗, [8][36] (4..8 为奇数项取反的副本)
    pub mdct_win: [i32; 8 * 36],
}

/// 获取派生表 (首次调用时构建)
pub fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}

/// 拆分为 [0.5, 1) 的尾数与 2 的指数, 0 返回 (0, 0)
fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 {
        return (0.0, 0);
    }
    let bits = x.to_bits();
    let e = ((bits >> 52) & 0x7ff) as i32 - 1022;
    let m = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (m, e)
}

impl Tables {
    fn build() -> Self {
        let mut t = Self {
            window: [0; 512],
            band_index_long: [0; 9 * 23],
            table_4_3_value: vec![0; TABLE_4_3_SIZE],
            table_4_3_exp: vec![0; TABLE_4_3_SIZE],
            expval_table: vec![0; 512 * 16],
            exp_table: [0; 512],
            is_table: [0; 32],
            is_table_lsf: [[0; 32]; 2],
            csa_table: [0; 32],
            mdct_win: [0; 8 * 36],
        };

        let round = 1 << (16 - WFRAC_BITS - 1);
        for (i, &e) in ENWINDOW.iter().enumerate() {
            let v = (e + round) >> (16 - WFRAC_BITS);
            t.window[i] = v;
            if i != 0 {
                t.window[512 - i] = if i & 63 != 0 { -v } else { v };
            }
        }

        for sr in 0..9 {
            let mut k = 0u16;
            for j in 0..22 {
                t.band_index_long[sr * 23 + j] = k;
                k += u16::from(BAND_SIZE_LONG[sr * 22 + j]);
            }
            t.band_index_long[sr * 23 + 22] = k;
        }

        for i in 1..TABLE_4_3_SIZE {
            let f = ((i >> 2) as f64).powf(4.0 / 3.0) * 2f64.powf((i & 3) as f64 * 0.25);
            let (fm, e) = frexp(f);
            let m = (fm * 2_147_483_648.0 + 0.5) as u32;
            let e = e + (FRAC_BITS as i32 - 31 + 5 - 100);
            t.table_4_3_value[i] = m;
            t.table_4_3_exp[i] = (-e) as i8;
        }

        for i in 0..512 * 16 {
            let exponent = i >> 4;
            let x = i & 15;
            let f = (x as f64).powf(4.0 / 3.0)
                * 2f64.powf((exponent as f64 - 400.0) * 0.25 + f64::from(FRAC_BITS) + 5.0);
            let v = f.round() as u64 as u32;
            t.expval_table[i] = v;
            if x == 1 {
                t.exp_table[exponent] = v;
            }
        }

        for i in 0..7 {
            let v = if i != 6 {
                let f = (i as f64 * std::f64::consts::PI / 12.0).tan();
                fixr(f / (1.0 + f))
            } else {
                fixr(1.0)
            };
            t.is_table[i] = v;
            t.is_table[16 + (6 - i)] = v;
        }

        for i in 0..16 {
            for (j, table) in t.is_table_lsf.iter_mut().enumerate() {
                let e = -((j as i32 + 1) * ((i as i32 + 1) >> 1));
                let f = 2f64.powf(f64::from(e) / 4.0);
                let k = i & 1;
                table[(k ^ 1) * 16 + i] = fixr(f);
                table[k * 16 + i] = fixr(1.0);
            }
        }

        for (i, &ci) in CI_TABLE.iter().enumerate() {
            let ci = f64::from(ci);
            let cs = f64::from((1.0 / (1.0 + ci * ci).sqrt()) as f32);
            let ca = f64::from((cs * ci) as f32);
            let fcs = fixhr(cs / 4.0);
            let fca = fixhr(ca / 4.0);
            t.csa_table[i * 4] = fcs;
            t.csa_table[i * 4 + 1] = fca;
            t.csa_table[i * 4 + 2] = fca.wrapping_add(fcs);
            t.csa_table[i * 4 + 3] = fca.wrapping_sub(fcs);
        }

        use std::f64::consts::PI;
        for i in 0..36 {
            for j in 0..4 {
                if j == 2 && i % 3 != 1 {
                    continue;
                }
                let fi = i as f64;
                let mut d = (PI * (fi + 0.5) / 36.0).sin();
                if j == 1 {
                    if i >= 30 {
                        d = 0.0;
                    } else if i >= 24 {
                        d = (PI * (fi - 18.0 + 0.5) / 12.0).sin();
                    } else if i >= 18 {
                        d = 1.0;
                    }
                } else if j == 3 {
                    if i < 6 {
                        d = 0.0;
                    } else if i < 12 {
                        d = (PI * (fi - 6.0 + 0.5) / 12.0).sin();
                    } else if i < 18 {
                        d = 1.0;
                    }
                }
                d *= 0.5 / (PI * (2.0 * fi + 19.0) / 72.0).cos();
                let idx = if j == 2 { j * 36 + i / 3 } else { j * 36 + i };
                t.mdct_win[idx] = fixhr(d / 32.0);
            }
        }
        for j in 0..4 {
            for i in (0..36).step_by(2) {
                t.mdct_win[(j + 4) * 36 + i] = t.mdct_win[j * 36 + i];
                t.mdct_win[(j + 4) * 36 + i + 1] = t.mdct_win[j * 36 + i + 1].wrapping_neg();
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_频带起点累加() {
        let t = tables();
        // 44100Hz 长块最后一个频带终点为 576
        assert_eq!(t.band_index_long[22], 576);
        assert_eq!(t.band_index_long[1], 4);
        for sr in 0..9 {
            let total: u32 = BAND_SIZE_SHORT[sr * 13..sr * 13 + 13]
                .iter()
                .map(|&v| u32::from(v))
                .sum();
            assert_eq!(total * 3, 576, "短块频带总宽度, sr_index={}", sr);
        }
    }

    #[test]
    fn test_合成窗对称() {
        let t = tables();
        assert_eq!(t.window[0], 0);
        assert_eq!(t.window[64], t.window[512 - 64]);
        assert_eq!(t.window[1], -t.window[511]);
    }

    #[test]
    fn test_四三次幂表() {
        let t = tables();
        assert_eq!(t.table_4_3_value[0], 0);
        // 1^(4/3) = 0.5 * 2^1
        assert_eq!(t.table_4_3_value[4], 1 << 30);
        assert_eq!(t.table_4_3_exp[4], 110);
        assert_eq!(t.expval_table[400 * 16 + 1], 1 << 20);
        assert_eq!(t.exp_table[400], 1 << 20);
    }

    #[test]
    fn test_强度立体声表() {
        let t = tables();
        assert_eq!(t.is_table[0], 0);
        assert_eq!(t.is_table[6], fixr(1.0));
        assert_eq!(t.is_table[16], fixr(1.0));
        assert_eq!(t.is_table[7], 0);
        assert_eq!(t.is_table_lsf[0][0], fixr(1.0));
    }

    #[test]
    fn test_frexp() {
        assert_eq!(frexp(0.0), (0.0, 0));
        assert_eq!(frexp(1.0), (0.5, 1));
        assert_eq!(frexp(3.0), (0.75, 2));
    }
}
