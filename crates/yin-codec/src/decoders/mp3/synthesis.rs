//! MP3 多相合成滤波器组 (Polyphase Synthesis Filterbank)
//!
//! 每次把 32 个子带样本合成为 32 个 PCM 样本:
//! 1. 32 点快速 DCT (蝶形网络)
//! 2. 结果写入 512 项环形缓冲 (镜像一份, 避免取模)
//! 3. 512 抽头加窗累加, 低位余数作为抖动状态带到下一次

use super::fixed::{OUT_SHIFT, fixhr, mulh};
use super::tables::tables;

const COS0_0: i32 = fixhr(0.500_602_998_235_196_301_34 / 2.0);
const COS0_1: i32 = fixhr(0.505_470_959_897_543_659_98 / 2.0);
const COS0_2: i32 = fixhr(0.515_447_309_922_624_546_97 / 2.0);
const COS0_3: i32 = fixhr(0.531_042_591_089_784_174_47 / 2.0);
const COS0_4: i32 = fixhr(0.553_103_896_034_444_527_82 / 2.0);
const COS0_5: i32 = fixhr(0.582_934_968_206_133_873_67 / 2.0);
const COS0_6: i32 = fixhr(0.622_504_123_035_664_816_15 / 2.0);
const COS0_7: i32 = fixhr(0.674_808_341_455_005_746_02 / 2.0);
const COS0_8: i32 = fixhr(0.744_536_271_002_298_449_77 / 2.0);
const COS0_9: i32 = fixhr(0.839_349_645_415_527_038_73 / 2.0);
const COS0_10: i32 = fixhr(0.972_568_237_861_960_693_69 / 2.0);
const COS0_11: i32 = fixhr(1.169_439_933_432_884_955_15 / 4.0);
const COS0_12: i32 = fixhr(1.484_164_616_314_166_277_24 / 4.0);
const COS0_13: i32 = fixhr(2.057_781_009_953_411_550_85 / 8.0);
const COS0_14: i32 = fixhr(3.407_608_418_468_718_785_70 / 8.0);
const COS0_15: i32 = fixhr(10.190_008_123_548_056_811_50 / 32.0);
const COS1_0: i32 = fixhr(0.502_419_286_188_155_705_51 / 2.0);
const COS1_1: i32 = fixhr(0.522_498_614_939_688_880_62 / 2.0);
const COS1_2: i32 = fixhr(0.566_944_034_816_357_703_68 / 2.0);
const COS1_3: i32 = fixhr(0.646_821_783_359_990_129_54 / 2.0);
const COS1_4: i32 = fixhr(0.788_154_623_451_250_224_73 / 2.0);
const COS1_5: i32 = fixhr(1.060_677_685_990_347_471_34 / 4.0);
const COS1_6: i32 = fixhr(1.722_447_098_238_333_927_82 / 4.0);
const COS1_7: i32 = fixhr(5.101_148_618_689_163_858_02 / 16.0);
const COS2_0: i32 = fixhr(0.509_795_579_104_159_168_94 / 2.0);
const COS2_1: i32 = fixhr(0.601_344_886_935_045_280_54 / 2.0);
const COS2_2: i32 = fixhr(0.899_976_223_136_415_704_63 / 2.0);
const COS2_3: i32 = fixhr(2.562_915_447_741_506_178_81 / 8.0);
const COS3_0: i32 = fixhr(0.541_196_100_146_196_984_39 / 2.0);
const COS3_1: i32 = fixhr(1.306_562_964_876_376_527_85 / 4.0);
const COS4_0: i32 = fixhr(0.707_106_781_186_547_524_39 / 2.0);

/// 第一组蝶形: (a, b, 系数, 预移位)
#[rustfmt::skip]
static BF1_PASSES: [(usize, usize, i32, u32); 64] = [
    (0, 31, COS0_0, 1), (15, 16, COS0_15, 5), (0, 15, COS1_0, 1), (16, 31, -COS1_0, 1),
    (7, 24, COS0_7, 1), (8, 23, COS0_8, 1), (7, 8, COS1_7, 4), (23, 24, -COS1_7, 4),
    (0, 7, COS2_0, 1), (8, 15, -COS2_0, 1), (16, 23, COS2_0, 1), (24, 31, -COS2_0, 1),
    (3, 28, COS0_3, 1), (12, 19, COS0_12, 2), (3, 12, COS1_3, 1), (19, 28, -COS1_3, 1),
    (4, 27, COS0_4, 1), (11, 20, COS0_11, 2), (4, 11, COS1_4, 1), (20, 27, -COS1_4, 1),
    (3, 4, COS2_3, 3), (11, 12, -COS2_3, 3), (19, 20, COS2_3, 3), (27, 28, -COS2_3, 3),
    (0, 3, COS3_0, 1), (4, 7, -COS3_0, 1), (8, 11, COS3_0, 1), (12, 15, -COS3_0, 1),
    (16, 19, COS3_0, 1), (20, 23, -COS3_0, 1), (24, 27, COS3_0, 1), (28, 31, -COS3_0, 1),
    (1, 30, COS0_1, 1), (14, 17, COS0_14, 3), (1, 14, COS1_1, 1), (17, 30, -COS1_1, 1),
    (6, 25, COS0_6, 1), (9, 22, COS0_9, 1), (6, 9, COS1_6, 2), (22, 25, -COS1_6, 2),
    (1, 6, COS2_1, 1), (9, 14, -COS2_1, 1), (17, 22, COS2_1, 1), (25, 30, -COS2_1, 1),
    (2, 29, COS0_2, 1), (13, 18, COS0_13, 3), (2, 13, COS1_2, 1), (18, 29, -COS1_2, 1),
    (5, 26, COS0_5, 1), (10, 21, COS0_10, 1), (5, 10, COS1_5, 2), (21, 26, -COS1_5, 2),
    (2, 5, COS2_2, 1), (10, 13, -COS2_2, 1), (18, 21, COS2_2, 1), (26, 29, -COS2_2, 1),
    (1, 2, COS3_1, 2), (5, 6, -COS3_1, 2), (9, 10, COS3_1, 2), (13, 14, -COS3_1, 2),
    (17, 18, COS3_1, 2), (21, 22, -COS3_1, 2), (25, 26, COS3_1, 2), (29, 30, -COS3_1, 2),
];

#[inline]
fn butterfly(tab: &mut [i32; 32], a: usize, b: usize, c: i32, shift: u32) {
    let t0 = tab[a].wrapping_add(tab[b]);
    let t1 = tab[a].wrapping_sub(tab[b]);
    tab[a] = t0;
    tab[b] = mulh(t1 << shift, c);
}

/// 32 点 DCT, 输出按自然顺序写入 `out`
fn dct32(tab: &mut [i32; 32], out: &mut [i32; 32]) {
    for &(a, b, c, s) in &BF1_PASSES {
        butterfly(tab, a, b, c, s);
    }

    for i in 0..8 {
        let (a, b, c, d) = (i * 4, i * 4 + 1, i * 4 + 2, i * 4 + 3);
        butterfly(tab, a, b, COS4_0, 1);
        butterfly(tab, c, d, -COS4_0, 1);
        tab[c] = tab[c].wrapping_add(tab[d]);
        if i & 1 != 0 {
            tab[a] = tab[a].wrapping_add(tab[c]);
            tab[c] = tab[c].wrapping_add(tab[b]);
            tab[b] = tab[b].wrapping_add(tab[d]);
        }
    }

    // 低半部分
    for (dst, src) in [(8, 12), (12, 10), (10, 14), (14, 9), (9, 13), (13, 11), (11, 15)] {
        tab[dst] = tab[dst].wrapping_add(tab[src]);
    }
    const LOW_ORDER: [usize; 16] = [0, 16, 8, 24, 4, 20, 12, 28, 2, 18, 10, 26, 6, 22, 14, 30];
    for (i, &o) in LOW_ORDER.iter().enumerate() {
        out[o] = tab[i];
    }

    // 高半部分
    for (dst, src) in [(24, 28), (28, 26), (26, 30), (30, 25), (25, 29), (29, 27), (27, 31)] {
        tab[dst] = tab[dst].wrapping_add(tab[src]);
    }
    const HIGH: [(usize, usize, usize); 15] = [
        (1, 16, 24),
        (17, 17, 25),
        (9, 18, 26),
        (25, 19, 27),
        (5, 20, 28),
        (21, 21, 29),
        (13, 22, 30),
        (29, 23, 31),
        (3, 24, 20),
        (19, 25, 21),
        (11, 26, 22),
        (27, 27, 23),
        (7, 28, 18),
        (23, 29, 19),
        (15, 30, 17),
    ];
    for &(o, a, b) in &HIGH {
        out[o] = tab[a].wrapping_add(tab[b]);
    }
    out[31] = tab[31];
}

/// 合成输出样本类型
pub trait OutputSample: Copy + Default + Send + 'static {
    /// 由累加器 (Q(OUT_SHIFT)) 生成一个输出样本
    fn from_sum(sum: i32) -> Self;
}

impl OutputSample for i16 {
    #[inline]
    fn from_sum(sum: i32) -> Self {
        (sum >> OUT_SHIFT).clamp(-32768, 32767) as i16
    }
}

impl OutputSample for f32 {
    #[inline]
    fn from_sum(sum: i32) -> Self {
        (sum >> OUT_SHIFT) as f32 / 32768.0
    }
}

const SUM_MASK: i32 = (1 << OUT_SHIFT) - 1;

/// 合成滤波的跨调用状态
pub struct SynthState<'a> {
    /// 环形缓冲 (1024 项, 后 512 项为镜像)
    pub buf: &'a mut [i16; 1024],
    pub offset: &'a mut usize,
    /// 累加器低位余数, 所有声道共用
    pub dither: &'a mut i32,
}

/// 合成一组 32 个子带样本
pub fn synth_filter<S: OutputSample>(state: &mut SynthState<'_>, sb_samples: &[i32], out: &mut [S]) {
    let mut tab = [0i32; 32];
    tab.copy_from_slice(&sb_samples[..32]);
    let mut dct = [0i32; 32];
    dct32(&mut tab, &mut dct);

    let off = *state.offset;
    let buf = &mut *state.buf;
    for (j, &v) in dct.iter().enumerate() {
        let v = v.clamp(-32768, 32767) as i16;
        buf[off + j] = v;
        buf[off + j + 512] = v;
    }

    let w = &tables().window;
    let tap = |i: usize| i32::from(buf[i]);
    let mut sum = *state.dither;

    for u in (0..512).step_by(64) {
        sum = sum.wrapping_add(w[u].wrapping_mul(tap(off + 16 + u)));
    }
    for u in (0..512).step_by(64) {
        sum = sum.wrapping_sub(w[u + 32].wrapping_mul(tap(off + 48 + u)));
    }
    out[0] = S::from_sum(sum);
    sum &= SUM_MASK;

    let mut w1 = 1;
    let mut w2 = 31;
    for j in 1..16 {
        let mut sum2 = 0i32;
        for u in (0..512).step_by(64) {
            let t = tap(off + 16 + j + u);
            sum = sum.wrapping_add(w[w1 + u].wrapping_mul(t));
            sum2 = sum2.wrapping_sub(w[w2 + u].wrapping_mul(t));
        }
        for u in (0..512).step_by(64) {
            let t = tap(off + 48 - j + u);
            sum = sum.wrapping_sub(w[w1 + u + 32].wrapping_mul(t));
            sum2 = sum2.wrapping_sub(w[w2 + u + 32].wrapping_mul(t));
        }
        out[j] = S::from_sum(sum);
        sum &= SUM_MASK;
        sum = sum.wrapping_add(sum2);
        out[32 - j] = S::from_sum(sum);
        sum &= SUM_MASK;
        w1 += 1;
        w2 -= 1;
    }

    for u in (0..512).step_by(64) {
        sum = sum.wrapping_sub(w[w1 + u + 32].wrapping_mul(tap(off + 32 + u)));
    }
    out[16] = S::from_sum(sum);
    sum &= SUM_MASK;

    *state.dither = sum;
    *state.offset = off.wrapping_sub(32) & 511;
}
