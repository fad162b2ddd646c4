//! MP3 比例因子解析与反量化指数
//!
//! 反量化本身在 Huffman 解码时查表完成, 这里负责为每个频谱系数
//! 计算指数 (global_gain, subblock_gain, 比例因子与预加重的合成结果).

use yin_core::BitReader;

use super::data::{GRANULE_SIZE, Granule};
use super::header::Mp3Header;
use super::side_info::MODE_EXT_I_STEREO;
use super::tables::{BAND_SIZE_LONG, BAND_SIZE_SHORT, LSF_NSF_TABLE, PRETAB, SLEN_TABLE, tables};

/// MPEG-1 比例因子
///
/// `prev` 为同声道 granule 0 的比例因子, scfsi 置位的分组直接复制.
pub fn read_scale_factors(g: &mut Granule, gb: &mut BitReader<'_>, prev: &[u8; 40]) {
    let slen1 = u32::from(SLEN_TABLE[g.scalefac_compress as usize]);
    let slen2 = u32::from(SLEN_TABLE[16 + g.scalefac_compress as usize]);
    let sc = &mut g.scale_factors;

    if g.block_type == 2 {
        let n = if g.switch_point { 17 } else { 18 };
        let mut j = 0;
        for _ in 0..n {
            sc[j] = gb.get_bits(slen1) as u8;
            j += 1;
        }
        for _ in 0..18 {
            sc[j] = gb.get_bits(slen2) as u8;
            j += 1;
        }
        sc[j..j + 3].fill(0);
    } else {
        let mut j = 0;
        for k in 0..4 {
            let n = if k == 0 { 6 } else { 5 };
            if g.scfsi & (0x8 >> k) == 0 {
                let slen = if k < 2 { slen1 } else { slen2 };
                for _ in 0..n {
                    sc[j] = gb.get_bits(slen) as u8;
                    j += 1;
                }
            } else {
                sc[j..j + n].copy_from_slice(&prev[j..j + n]);
                j += n;
            }
        }
        sc[j] = 0;
    }
}

/// 把 scalefac_compress 展开为 4 个分组位宽
fn lsf_sf_expand(mut sf: u32, n1: u32, n2: u32, n3: u32) -> [u32; 4] {
    let mut slen = [0u32; 4];
    if n3 != 0 {
        slen[3] = sf % n3;
        sf /= n3;
    }
    if n2 != 0 {
        slen[2] = sf % n2;
        sf /= n2;
    }
    slen[1] = sf % n1;
    slen[0] = sf / n1;
    slen
}

/// LSF (MPEG-2/2.5) 比例因子
pub fn read_lsf_scale_factors(
    g: &mut Granule,
    gb: &mut BitReader<'_>,
    header: &Mp3Header,
    ch: usize,
) {
    let tindex = match (g.block_type, g.switch_point) {
        (2, true) => 2,
        (2, false) => 1,
        _ => 0,
    };

    let mut sf = g.scalefac_compress;
    let (slen, tindex2) = if header.mode_ext & MODE_EXT_I_STEREO != 0 && ch == 1 {
        // 强度立体声右声道
        sf >>= 1;
        if sf < 180 {
            (lsf_sf_expand(sf, 6, 6, 0), 3)
        } else if sf < 244 {
            (lsf_sf_expand(sf - 180, 4, 4, 0), 4)
        } else {
            (lsf_sf_expand(sf - 244, 3, 0, 0), 5)
        }
    } else if sf < 400 {
        (lsf_sf_expand(sf, 5, 4, 4), 0)
    } else if sf < 500 {
        (lsf_sf_expand(sf - 400, 5, 4, 0), 1)
    } else {
        g.preflag = 1;
        (lsf_sf_expand(sf - 500, 3, 0, 0), 2)
    };

    let sc = &mut g.scale_factors;
    let mut j = 0;
    for (k, &sl) in slen.iter().enumerate() {
        let n = usize::from(LSF_NSF_TABLE[tindex2 * 12 + tindex * 4 + k]);
        for _ in 0..n {
            sc[j] = gb.get_bits(sl) as u8;
            j += 1;
        }
    }
    sc[j..].fill(0);
}

/// 由比例因子计算每个系数的反量化指数
pub fn compute_exponents(g: &Granule, header: &Mp3Header, exponents: &mut [u16; GRANULE_SIZE]) {
    let sri = header.sample_rate_index;
    let pretab = &PRETAB[g.preflag as usize * 22..];
    let gain = g.global_gain - 210;
    let shift = g.scalefac_scale + 1;
    let mut pos = 0;

    for i in 0..g.long_end {
        let v0 = gain - ((i32::from(g.scale_factors[i]) + i32::from(pretab[i])) << shift) + 400;
        let len = usize::from(BAND_SIZE_LONG[sri * 22 + i]);
        exponents[pos..pos + len].fill(v0 as u16);
        pos += len;
    }

    if g.short_start < 13 {
        let gains = g.subblock_gain.map(|sg| gain - (sg << 3));
        let mut k = g.long_end;
        for i in g.short_start..13 {
            let len = usize::from(BAND_SIZE_SHORT[sri * 13 + i]);
            for &window_gain in &gains {
                let v0 = window_gain - (i32::from(g.scale_factors[k]) << shift) + 400;
                k += 1;
                exponents[pos..pos + len].fill(v0 as u16);
                pos += len;
            }
        }
    }
}

/// 大值 (x >= 15) 反量化: x^(4/3) * 2^((exponent - 400) / 4), 定点结果
pub fn l3_unscale(value: u32, exponent: u32) -> u32 {
    let t = tables();
    let i = (value * 4 + (exponent & 3)) as usize;
    let (Some(&e), Some(&m)) = (t.table_4_3_exp.get(i), t.table_4_3_value.get(i)) else {
        return 0;
    };
    let e = i32::from(e) - (exponent >> 2) as i32;
    if e > 31 {
        return 0;
    }
    round_shift(m, e)
}

/// 四舍五入右移 `e` 位, `e <= 0` 时原样返回
fn round_shift(m: u32, e: i32) -> u32 {
    let e = e.max(0) as u32;
    m.wrapping_add((1u32 << e) >> 1) >> e
}
