//! 采样帧与秒之间的换算.
//!
//! 缓冲的起止时间统一舍入到纳秒, 保证相邻缓冲首尾时间可以精确比较.

/// 将秒数舍入到纳秒精度
#[inline]
pub fn round_to_nanos(seconds: f64) -> f64 {
    (seconds * 1e9).round() / 1e9
}

/// 采样帧位置换算为秒 (纳秒精度)
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    round_to_nanos(frames as f64 / f64::from(sample_rate))
}

/// 缓冲结束时间: 起始时间加上时长, 舍入到纳秒
pub fn buffer_end_time(start_time: f64, length: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return start_time;
    }
    round_to_nanos(start_time + length as f64 / f64::from(sample_rate))
}

/// 秒数换算为采样帧数 (四舍五入)
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * f64::from(sample_rate)).round() as u64
}
