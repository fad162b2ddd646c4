//! MP3 立体声处理 (Stereo Processing)
//!
//! - 强度立体声: 从高频向低频扫描右声道, 遇到第一个非零频带前按
//!   比例因子把左声道能量分配到两个声道, 之后退化为 M/S.
//! - 短块按窗口分别判断是否退化.
//! - 仅 M/S 时对全部 576 个系数做和差变换.

use super::data::{GRANULE_SIZE, Granule};
use super::fixed::{ISQRT2, mull};
use super::header::Mp3Header;
use super::side_info::{MODE_EXT_I_STEREO, MODE_EXT_MS_STEREO};
use super::tables::{BAND_SIZE_LONG, BAND_SIZE_SHORT, tables};

/// M/S 频带: (L, R) = ((M + S) / sqrt2, (M - S) / sqrt2)
fn ms_band(mode_ext: u32, h0: &mut [i32], h1: &mut [i32]) {
    if mode_ext & MODE_EXT_MS_STEREO == 0 {
        return;
    }
    for (a, b) in h0.iter_mut().zip(h1.iter_mut()) {
        let (t0, t1) = (*a, *b);
        *a = mull(t0.wrapping_add(t1), ISQRT2);
        *b = mull(t0.wrapping_sub(t1), ISQRT2);
    }
}

/// 强度立体声频带
fn is_band(h0: &mut [i32], h1: &mut [i32], v1: i32, v2: i32) {
    for (a, b) in h0.iter_mut().zip(h1.iter_mut()) {
        let t0 = *a;
        *a = mull(t0, v1);
        *b = mull(t0, v2);
    }
}

/// 处理一个 granule 的左右声道
pub fn compute_stereo(header: &Mp3Header, g0: &mut Granule, g1: &mut Granule) {
    let mode_ext = header.mode_ext;
    let sri = header.sample_rate_index;

    if mode_ext & MODE_EXT_I_STEREO != 0 {
        let t = tables();
        let (is_tab, sf_max): (&[i32; 32], u8) = if header.lsf {
            (&t.is_table_lsf[(g1.scalefac_compress & 1) as usize], 16)
        } else {
            (&t.is_table, 7)
        };

        let h0 = &mut g0.sb_hybrid;
        let h1 = &mut g1.sb_hybrid;
        let mut ptr = GRANULE_SIZE;
        let mut non_zero_short = [false; 3];
        let mut k = (13 - g1.short_start) * 3 + g1.long_end;

        for i in (g1.short_start..13).rev() {
            if i != 11 {
                k -= 3;
            }
            let len = usize::from(BAND_SIZE_SHORT[sri * 13 + i]);
            for l in (0..3).rev() {
                ptr -= len;
                let band = ptr..ptr + len;
                if !non_zero_short[l] && h1[band.clone()].iter().any(|&v| v != 0) {
                    non_zero_short[l] = true;
                }
                let sf = g1.scale_factors[k - 3 + l];
                if non_zero_short[l] || sf >= sf_max {
                    ms_band(mode_ext, &mut h0[band.clone()], &mut h1[band]);
                } else {
                    let sf = usize::from(sf);
                    is_band(&mut h0[band.clone()], &mut h1[band], is_tab[sf], is_tab[16 + sf]);
                }
            }
        }

        let mut non_zero = non_zero_short.iter().any(|&f| f);
        for i in (0..g1.long_end).rev() {
            let len = usize::from(BAND_SIZE_LONG[sri * 22 + i]);
            ptr -= len;
            let band = ptr..ptr + len;
            if !non_zero && h1[band.clone()].iter().any(|&v| v != 0) {
                non_zero = true;
            }
            // 最后一个频带沿用前一个比例因子
            let sf = g1.scale_factors[if i == 21 { 20 } else { i }];
            if non_zero || sf >= sf_max {
                ms_band(mode_ext, &mut h0[band.clone()], &mut h1[band]);
            } else {
                let sf = usize::from(sf);
                is_band(&mut h0[band.clone()], &mut h1[band], is_tab[sf], is_tab[16 + sf]);
            }
        }
    } else if mode_ext & MODE_EXT_MS_STEREO != 0 {
        // 增益已在侧边信息中扣除 sqrt(2)
        for (a, b) in g0.sb_hybrid.iter_mut().zip(g1.sb_hybrid.iter_mut()) {
            let (t0, t1) = (*a, *b);
            *a = t0.wrapping_add(t1);
            *b = t0.wrapping_sub(t1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(mode_ext: u32) -> Mp3Header {
        // MPEG-1 44100Hz 联合立体声
        Mp3Header::parse(0xFFFB_9040 | (mode_ext << 4)).unwrap()
    }

    fn long_granule() -> Granule {
        Granule {
            short_start: 13,
            long_end: 22,
            ..Default::default()
        }
    }

    #[test]
    fn test_ms_立体声_和差() {
        let mut g0 = long_granule();
        let mut g1 = long_granule();
        g0.sb_hybrid[5] = 100;
        g1.sb_hybrid[5] = 30;
        compute_stereo(&header(2), &mut g0, &mut g1);
        assert_eq!(g0.sb_hybrid[5], 130);
        assert_eq!(g1.sb_hybrid[5], 70);
    }

    #[test]
    fn test_无扩展模式不处理() {
        let mut g0 = long_granule();
        let mut g1 = long_granule();
        g0.sb_hybrid[0] = 9;
        g1.sb_hybrid[0] = 4;
        compute_stereo(&header(0), &mut g0, &mut g1);
        assert_eq!(g0.sb_hybrid[0], 9);
        assert_eq!(g1.sb_hybrid[0], 4);
    }

    #[test]
    fn test_强度立体声_右声道全零() {
        // 比例因子 0 对应 is_pos=0, 能量全部分给右声道
        let mut g0 = long_granule();
        let mut g1 = long_granule();
        g0.sb_hybrid.fill(1 << 16);
        compute_stereo(&header(1), &mut g0, &mut g1);
        let t = tables();
        let expect_l = mull(1 << 16, t.is_table[0]);
        let expect_r = mull(1 << 16, t.is_table[16]);
        assert_eq!(g0.sb_hybrid[0], expect_l);
        assert_eq!(g1.sb_hybrid[0], expect_r);
        assert_eq!(g0.sb_hybrid[575], expect_l);
    }

    #[test]
    fn test_强度立体声_非零频带以下退化() {
        let mut g0 = long_granule();
        let mut g1 = long_granule();
        g0.sb_hybrid.fill(1000);
        // 右声道在第 0 个长块频带有能量
        g1.sb_hybrid[0] = 10;
        // 高频带比例因子 7 (无效位置) 也走 M/S 路径
        g1.scale_factors[20] = 7;
        compute_stereo(&header(3), &mut g0, &mut g1);
        // 第 0 个频带 M/S
        assert_eq!(g0.sb_hybrid[0], mull(1010, ISQRT2));
        assert_eq!(g1.sb_hybrid[0], mull(990, ISQRT2));
        // 最后两个频带使用比例因子 7, 也是 M/S
        assert_eq!(g0.sb_hybrid[575], mull(1000, ISQRT2));
        // 中间频带为强度立体声
        let t = tables();
        assert_eq!(g0.sb_hybrid[100], mull(1000, t.is_table[0]));
    }
}
