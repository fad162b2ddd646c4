//! MP3 IMDCT (Inverse Modified Discrete Cosine Transform)
//!
//! 长块做 36 点 IMDCT, 短块做 3 次 12 点 IMDCT, 加窗后与上一个 granule
//! 的重叠缓冲相加. 输出写入子带样本 `sb_samples[18 * gr + i][sb]`.

use super::data::{GRANULE_SIZE, Granule, SBLIMIT};
use super::fixed::{mulh, mull};
use super::tables::{C1, C2, C3, C4, C5, C7, C8, ICOS36, ICOS36H, tables};

/// 36 点 IMDCT
///
/// `input` 为一个子带的 18 个系数 (会被原地改写), `out` 从子带列起点开始,
/// 步长 `SBLIMIT`; `buf` 为该子带的 18 项重叠缓冲.
fn imdct36(out: &mut [i32], buf: &mut [i32], input: &mut [i32], win: &[i32]) {
    for i in (1..18).rev() {
        input[i] = input[i].wrapping_add(input[i - 1]);
    }
    for i in (3..18).rev().step_by(2) {
        input[i] = input[i].wrapping_add(input[i - 2]);
    }

    let mut tmp = [0i32; 18];
    for j in 0..2 {
        let x = |k: usize| input[j + k];

        let t2 = x(8).wrapping_add(x(16)).wrapping_sub(x(4));
        let t3 = x(0).wrapping_add(x(12) >> 1);
        let t1 = x(0).wrapping_sub(x(12));
        tmp[j + 6] = t1.wrapping_sub(t2 >> 1);
        tmp[j + 16] = t1.wrapping_add(t2);

        let t0 = mulh(x(4).wrapping_add(x(8)).wrapping_mul(2), C2);
        let t1 = mulh(x(8).wrapping_sub(x(16)), -2 * C8);
        let t2 = mulh(x(4).wrapping_add(x(16)).wrapping_mul(2), -C4);

        tmp[j + 10] = t3.wrapping_sub(t0).wrapping_sub(t2);
        tmp[j + 2] = t3.wrapping_add(t0).wrapping_add(t1);
        tmp[j + 14] = t3.wrapping_add(t2).wrapping_sub(t1);

        tmp[j + 4] = mulh(
            x(10).wrapping_add(x(14)).wrapping_sub(x(2)).wrapping_mul(2),
            -C3,
        );
        let t2 = mulh(x(2).wrapping_add(x(10)).wrapping_mul(2), C1);
        let t3 = mulh(x(10).wrapping_sub(x(14)), -2 * C7);
        let t0 = mulh(x(6).wrapping_mul(2), C3);
        let t1 = mulh(x(2).wrapping_add(x(14)).wrapping_mul(2), -C5);

        tmp[j] = t2.wrapping_add(t3).wrapping_add(t0);
        tmp[j + 12] = t2.wrapping_add(t1).wrapping_sub(t0);
        tmp[j + 8] = t3.wrapping_sub(t1).wrapping_sub(t0);
    }

    let mut emit = |k: usize, t: i32, t_next: i32, w_out: usize, w_buf: usize| {
        out[k * SBLIMIT] = mulh(t, win[w_out]).wrapping_add(buf[k]);
        buf[k] = mulh(t_next, win[w_buf]);
    };

    for j in 0..4 {
        let i = j * 4;
        let (t0, t1) = (tmp[i], tmp[i + 2]);
        let s0 = t1.wrapping_add(t0);
        let s2 = t1.wrapping_sub(t0);
        let (t2, t3) = (tmp[i + 1], tmp[i + 3]);
        let s1 = mulh(t3.wrapping_add(t2).wrapping_mul(2), ICOS36H[j]);
        let s3 = mull(t3.wrapping_sub(t2), ICOS36[8 - j]);

        let (t0, t1) = (s0.wrapping_add(s1), s0.wrapping_sub(s1));
        emit(9 + j, t1, t0, 9 + j, 27 + j);
        emit(8 - j, t1, t0, 8 - j, 26 - j);

        let (t0, t1) = (s2.wrapping_add(s3), s2.wrapping_sub(s3));
        emit(17 - j, t1, t0, 17 - j, 35 - j);
        emit(j, t1, t0, j, 18 + j);
    }

    let s0 = tmp[16];
    let s1 = mulh(tmp[17].wrapping_mul(2), ICOS36H[4]);
    let (t0, t1) = (s0.wrapping_add(s1), s0.wrapping_sub(s1));
    emit(13, t1, t0, 13, 31);
    emit(4, t1, t0, 4, 22);
}

/// 12 点 IMDCT, 读取 `input[0], input[3], ..., input[15]`
fn imdct12(out: &mut [i32; 12], input: &[i32]) {
    let mut in0 = input[0];
    let mut in1 = input[3].wrapping_add(input[0]);
    let mut in2 = input[6].wrapping_add(input[3]);
    let mut in3 = input[9].wrapping_add(input[6]);
    let mut in4 = input[12].wrapping_add(input[9]);
    let mut in5 = input[15].wrapping_add(input[12]);
    in5 = in5.wrapping_add(in3);
    in3 = in3.wrapping_add(in1);

    in2 = mulh(in2.wrapping_mul(2), C3);
    in3 = mulh(in3.wrapping_mul(4), C3);

    let t1 = in0.wrapping_sub(in4);
    let t2 = mulh(in1.wrapping_sub(in5).wrapping_mul(2), ICOS36H[4]);

    out[7] = t1.wrapping_add(t2);
    out[10] = out[7];
    out[1] = t1.wrapping_sub(t2);
    out[4] = out[1];

    in0 = in0.wrapping_add(in4 >> 1);
    in4 = in0.wrapping_add(in2);
    in5 = in5.wrapping_add(in1.wrapping_mul(2));
    in1 = mulh(in5.wrapping_add(in3), ICOS36H[1]);
    out[8] = in4.wrapping_add(in1);
    out[9] = out[8];
    out[2] = in4.wrapping_sub(in1);
    out[3] = out[2];

    in0 = in0.wrapping_sub(in2);
    in5 = mulh(in5.wrapping_sub(in3).wrapping_mul(2), ICOS36H[7]);
    out[0] = in0.wrapping_sub(in5);
    out[5] = out[0];
    out[6] = in0.wrapping_add(in5);
    out[11] = out[6];
}

/// 短块子带: 3 个窗口的 12 点 IMDCT 交错重叠
fn short_subband(out: &mut [i32], buf: &mut [i32], input: &[i32], win: &[i32]) {
    let mut tmp = [0i32; 12];

    for i in 0..6 {
        out[i * SBLIMIT] = buf[i];
    }
    imdct12(&mut tmp, input);
    for i in 0..6 {
        out[(6 + i) * SBLIMIT] = mulh(tmp[i], win[i]).wrapping_add(buf[i + 6]);
        buf[i + 12] = mulh(tmp[i + 6], win[i + 6]);
    }
    imdct12(&mut tmp, &input[1..]);
    for i in 0..6 {
        out[(12 + i) * SBLIMIT] = mulh(tmp[i], win[i]).wrapping_add(buf[i + 12]);
        buf[i] = mulh(tmp[i + 6], win[i + 6]);
    }
    imdct12(&mut tmp, &input[2..]);
    for i in 0..6 {
        buf[i] = mulh(tmp[i], win[i]).wrapping_add(buf[i]);
        buf[i + 6] = mulh(tmp[i + 6], win[i + 6]);
        buf[i + 12] = 0;
    }
}

/// 一个 granule 的 IMDCT
///
/// `sb_samples` 为该 granule 对应的 18 行子带样本 (`18 * SBLIMIT`).
pub fn compute_imdct(g: &mut Granule, sb_samples: &mut [i32], mdct_buf: &mut [i32; GRANULE_SIZE]) {
    let hybrid = &mut g.sb_hybrid;

    // 高频全零的子带只需输出重叠缓冲
    let mut ptr = GRANULE_SIZE;
    while ptr >= 36 {
        ptr -= 6;
        if hybrid[ptr..ptr + 6].iter().any(|&v| v != 0) {
            break;
        }
    }
    let sblimit = ptr / 18 + 1;

    let mdct_long_end = match (g.block_type, g.switch_point) {
        (2, true) => 2,
        (2, false) => 0,
        _ => sblimit,
    };
    let win_table = &tables().mdct_win;

    for j in 0..mdct_long_end {
        let base = if g.switch_point && j < 2 {
            0
        } else {
            g.block_type as usize * 36
        };
        // 奇数子带使用频率反转后的窗
        let win = base + if j & 1 != 0 { 144 } else { 0 };
        imdct36(
            &mut sb_samples[j..],
            &mut mdct_buf[j * 18..j * 18 + 18],
            &mut hybrid[j * 18..j * 18 + 18],
            &win_table[win..win + 36],
        );
    }

    for j in mdct_long_end..sblimit {
        let win = 72 + if j & 1 != 0 { 144 } else { 0 };
        short_subband(
            &mut sb_samples[j..],
            &mut mdct_buf[j * 18..j * 18 + 18],
            &hybrid[j * 18..j * 18 + 18],
            &win_table[win..win + 12],
        );
    }

    for j in sblimit..SBLIMIT {
        let buf = &mut mdct_buf[j * 18..j * 18 + 18];
        for (i, v) in buf.iter_mut().enumerate() {
            sb_samples[j + i * SBLIMIT] = *v;
            *v = 0;
        }
    }
}
