//! MP3 定点运算工具
//!
//! 整条合成链路使用 32 位定点数, 所有加减与移位都按二进制补码回绕,
//! 这样不同平台上的输出逐位一致. 乘法结果四舍五入, 截断会把
//! 微小的负值推向 -1, 在低增益段累积成直流偏移.

/// 频域样本小数位数
pub const FRAC_BITS: u32 = 15;
/// 合成窗小数位数
pub const WFRAC_BITS: u32 = 14;
/// 合成输出右移位数
pub const OUT_SHIFT: u32 = WFRAC_BITS + FRAC_BITS - 15;

const FRAC_ONE: f64 = (1u32 << FRAC_BITS) as f64;

/// 实数转 Q15 定点 (向零截断)
pub const fn fixr(a: f64) -> i32 {
    (a * FRAC_ONE + 0.5) as i64 as i32
}

/// 实数转 Q32 定点 (向零截断, 超出 32 位时回绕)
pub const fn fixhr(a: f64) -> i32 {
    (4_294_967_296.0 * a + 0.5) as i64 as i32
}

/// 64 位乘积的高 32 位 (四舍五入)
#[inline(always)]
pub fn mulh(a: i32, b: i32) -> i32 {
    ((i64::from(a) * i64::from(b) + (1 << 31)) >> 32) as i32
}

/// 64 位乘积右移 15 位后取低 32 位 (四舍五入)
#[inline(always)]
pub fn mull(a: i32, b: i32) -> i32 {
    ((i64::from(a) * i64::from(b) + (1 << (FRAC_BITS - 1))) >> FRAC_BITS) as i32
}

/// sqrt(1/2), Q15
pub const ISQRT2: i32 = fixr(0.707_106_781_186_547_524_40);
