//! 淡入淡出曲线.
//!
//! 曲线为指数形状 `v0 * (v1 / v0) ^ (t / duration)`, 以 `CURVE_LENGTH + 1`
//! 个等距点采样, 点与点之间线性插值.

/// 淡出的最低音量 (指数曲线不能到 0)
pub const FADE_MINIMUM_VOLUME: f32 = 0.2;

/// 曲线分段数
pub const CURVE_LENGTH: usize = 8;

/// 曲线采样点
pub type FadeCurve = [f32; CURVE_LENGTH + 1];

/// 从 `v0` 到 `v1` 的指数曲线
pub fn fade_curve(v0: f32, v1: f32) -> FadeCurve {
    let v0 = v0.max(f32::MIN_POSITIVE);
    let ratio = v1 / v0;
    std::array::from_fn(|i| v0 * ratio.powf(i as f32 / CURVE_LENGTH as f32))
}

/// 曲线在时刻 `t` 的取值, 曲线从 `t0` 开始持续 `duration` 秒
///
/// 开始前取首点, 结束后保持末点.
pub fn envelope_at(curve: &FadeCurve, t0: f64, duration: f64, t: f64) -> f32 {
    if t <= t0 {
        return curve[0];
    }
    if duration <= 0.0 || t >= t0 + duration {
        return curve[CURVE_LENGTH];
    }
    let pos = (t - t0) / duration * CURVE_LENGTH as f64;
    let index = (pos.floor() as usize).min(CURVE_LENGTH - 1);
    let frac = (pos - index as f64) as f32;
    curve[index] + (curve[index + 1] - curve[index]) * frac
}

/// 增益包络: 一条曲线加上起点与时长 (时钟时间)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainEnvelope {
    pub curve: FadeCurve,
    pub start: f64,
    pub duration: f64,
}

impl GainEnvelope {
    pub fn new(curve: FadeCurve, start: f64, duration: f64) -> Self {
        Self {
            curve,
            start,
            duration: duration.max(0.0),
        }
    }

    /// 从 `start` 起恒为 `value`
    pub fn constant(value: f32, start: f64) -> Self {
        Self::new([value; CURVE_LENGTH + 1], start, 0.0)
    }

    /// 从 `from` 淡出到 `level` 对应的最低音量
    ///
    /// 终点为 `FADE_MINIMUM_VOLUME * level`, 且不高于起点, 曲线不会上升.
    pub fn fade_out(from: f32, level: f32, start: f64, duration: f64) -> Self {
        let floor = (FADE_MINIMUM_VOLUME * level).min(from);
        Self::new(fade_curve(from, floor), start, duration)
    }

    /// 从最低音量淡入到 1
    pub fn fade_in(start: f64, duration: f64) -> Self {
        Self::new(fade_curve(FADE_MINIMUM_VOLUME, 1.0), start, duration)
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn value_at(&self, t: f64) -> f32 {
        envelope_at(&self.curve, self.start, self.duration, t)
    }
}

/// 淡入进行到 `t` 时的音量 (按精确指数形状计算)
///
/// 淡入未开始或已结束时返回 1.
pub fn fade_in_progress_volume(fade_in_started: f64, fade_in_length: f64, t: f64) -> f32 {
    let end = fade_in_started + fade_in_length;
    if fade_in_length <= 0.0 || t < fade_in_started || t >= end {
        return 1.0;
    }
    let progress = ((t - fade_in_started) / fade_in_length) as f32;
    FADE_MINIMUM_VOLUME * (1.0 / FADE_MINIMUM_VOLUME).powf(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_淡出曲线端点与形状() {
        let curve = fade_curve(0.8, FADE_MINIMUM_VOLUME);
        assert!(close(curve[0], 0.8));
        assert!(close(curve[CURVE_LENGTH], FADE_MINIMUM_VOLUME));
        for (i, v) in curve.iter().enumerate() {
            let t = i as f32 / CURVE_LENGTH as f32;
            assert!(close(*v, 0.8 * (FADE_MINIMUM_VOLUME / 0.8).powf(t)));
        }
    }

    #[test]
    fn test_包络插值() {
        let env = GainEnvelope::fade_in(10.0, 1.0);
        assert!(close(env.value_at(0.0), FADE_MINIMUM_VOLUME));
        assert!(close(env.value_at(10.0), FADE_MINIMUM_VOLUME));
        assert!(close(env.value_at(11.0), 1.0));
        assert!(close(env.value_at(50.0), 1.0));
        // 采样点上与指数公式一致
        let t = 10.0 + 3.0 / CURVE_LENGTH as f64;
        let expected = FADE_MINIMUM_VOLUME * (1.0 / FADE_MINIMUM_VOLUME).powf(3.0 / 8.0);
        assert!(close(env.value_at(t), expected));
        // 两点之间单调
        let mid = env.value_at(10.0 + 3.5 / CURVE_LENGTH as f64);
        assert!(mid > expected && mid < env.value_at(10.0 + 4.0 / CURVE_LENGTH as f64));
    }

    #[test]
    fn test_低音量淡出不上升() {
        let env = GainEnvelope::fade_out(0.1, 0.1, 0.0, 1.0);
        assert!(close(env.value_at(1.0), FADE_MINIMUM_VOLUME * 0.1));
        let mut previous = env.value_at(0.0);
        for i in 1..=20 {
            let v = env.value_at(i as f64 / 20.0);
            assert!(v <= previous + 1e-7 && v <= 0.1 + 1e-7);
            previous = v;
        }
        // 起点已低于最低音量时保持不变
        let env = GainEnvelope::fade_out(0.05, 1.0, 0.0, 1.0);
        assert!(close(env.value_at(1.0), 0.05));
    }

    #[test]
    fn test_零时长包络() {
        let env = GainEnvelope::constant(0.5, 2.0);
        assert_eq!(env.value_at(1.0), 0.5);
        assert_eq!(env.value_at(3.0), 0.5);
        let curve = fade_curve(1.0, 0.2);
        assert_eq!(envelope_at(&curve, 0.0, 0.0, 0.1), curve[CURVE_LENGTH]);
    }

    #[test]
    fn test_淡入进行中的音量() {
        assert_eq!(fade_in_progress_volume(0.0, 1.0, 2.0), 1.0);
        assert_eq!(fade_in_progress_volume(0.0, 0.0, 0.5), 1.0);
        assert!(close(fade_in_progress_volume(0.0, 1.0, 0.0), FADE_MINIMUM_VOLUME));
        let half = fade_in_progress_volume(0.0, 1.0, 0.5);
        assert!(close(half, FADE_MINIMUM_VOLUME * 5f32.sqrt()));
    }
}
