//! MP3 抗混叠处理 (Alias Reduction)
//!
//! 在相邻子带边界两侧各 8 个系数上做蝶形运算, 纯短块不处理,
//! 混合块只处理长块部分的第一个边界.

use super::data::{Granule, SBLIMIT};
use super::fixed::mulh;
use super::tables::tables;

/// 对一个 granule 的频谱做抗混叠
pub fn compute_antialias(g: &mut Granule) {
    let n = if g.block_type == 2 {
        if !g.switch_point {
            return;
        }
        1
    } else {
        SBLIMIT - 1
    };

    let csa = &tables().csa_table;
    let hybrid = &mut g.sb_hybrid;
    for boundary in (1..=n).map(|i| i * 18) {
        for j in 0..8 {
            let c = &csa[j * 4..j * 4 + 4];
            let lo = boundary - 1 - j;
            let hi = boundary + j;
            let (t0, t1) = (hybrid[lo], hybrid[hi]);
            let t2 = mulh(t0.wrapping_add(t1), c[0]);
            hybrid[lo] = t2.wrapping_sub(mulh(t1, c[2])) << 2;
            hybrid[hi] = t2.wrapping_add(mulh(t0, c[3])) << 2;
        }
    }
}
