//! 解码后的 PCM 数据.
//!
//! 解码器总是输出平面格式: 每个声道一个独立的 Vec.

use yin_core::{ChannelLayout, SampleFormat, time};

/// 平面 PCM 样本
#[derive(Debug, Clone, PartialEq)]
pub enum PcmSamples {
    /// 16 位整数 (合成时带抖动)
    S16(Vec<Vec<i16>>),
    /// 32 位浮点, 范围 [-1, 1)
    F32(Vec<Vec<f32>>),
}

impl PcmSamples {
    /// 分配 `channels` 个长度为 `len` 的零值声道
    pub fn new(format: SampleFormat, channels: usize, len: usize) -> Self {
        if format.is_float() {
            Self::F32(vec![vec![0.0; len]; channels])
        } else {
            Self::S16(vec![vec![0; len]; channels])
        }
    }

    /// 采样格式 (平面)
    pub fn sample_format(&self) -> SampleFormat {
        match self {
            Self::S16(_) => SampleFormat::S16p,
            Self::F32(_) => SampleFormat::F32p,
        }
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        match self {
            Self::S16(p) => p.len(),
            Self::F32(p) => p.len(),
        }
    }

    /// 每声道存储长度
    pub fn len(&self) -> usize {
        match self {
            Self::S16(p) => p.first().map_or(0, Vec::len),
            Self::F32(p) => p.first().map_or(0, Vec::len),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从 `src[src_off..src_off + n]` 复制到 `self[dst_off..]`, 逐声道
    ///
    /// 格式不同或声道数不足时只复制可对应的部分.
    pub fn copy_from(&mut self, dst_off: usize, src: &PcmSamples, src_off: usize, n: usize) {
        if n == 0 {
            return;
        }
        match (self, src) {
            (Self::S16(dst), Self::S16(src)) => copy_planes(dst, dst_off, src, src_off, n),
            (Self::F32(dst), Self::F32(src)) => copy_planes(dst, dst_off, src, src_off, n),
            (Self::F32(dst), Self::S16(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    for (o, &v) in d[dst_off..dst_off + n]
                        .iter_mut()
                        .zip(&s[src_off..src_off + n])
                    {
                        *o = f32::from(v) / 32768.0;
                    }
                }
            }
            (Self::S16(dst), Self::F32(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    for (o, &v) in d[dst_off..dst_off + n]
                        .iter_mut()
                        .zip(&s[src_off..src_off + n])
                    {
                        *o = (v * 32768.0).clamp(-32768.0, 32767.0) as i16;
                    }
                }
            }
        }
    }

    /// 复制前 `len` 个样本
    pub fn truncated(&self, len: usize) -> Self {
        match self {
            Self::S16(p) => Self::S16(p.iter().map(|c| c[..len.min(c.len())].to_vec()).collect()),
            Self::F32(p) => Self::F32(p.iter().map(|c| c[..len.min(c.len())].to_vec()).collect()),
        }
    }

    /// 读取一个样本并换算为浮点
    pub fn sample_f32(&self, channel: usize, index: usize) -> f32 {
        match self {
            Self::S16(p) => f32::from(p[channel][index]) / 32768.0,
            Self::F32(p) => p[channel][index],
        }
    }

    /// 转换为平面浮点
    pub fn to_f32_planar(&self) -> Vec<Vec<f32>> {
        match self {
            Self::S16(p) => p
                .iter()
                .map(|c| c.iter().map(|&v| f32::from(v) / 32768.0).collect())
                .collect(),
            Self::F32(p) => p.clone(),
        }
    }
}

fn copy_planes<T: Copy>(dst: &mut [Vec<T>], dst_off: usize, src: &[Vec<T>], src_off: usize, n: usize) {
    for (d, s) in dst.iter_mut().zip(src) {
        d[dst_off..dst_off + n].copy_from_slice(&s[src_off..src_off + n]);
    }
}

/// 解码输出的一段 PCM
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
    /// 平面样本
    pub samples: PcmSamples,
    /// 有效样本数 (每声道)
    pub nb_samples: usize,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 首个样本在流中的位置 (每声道样本数)
    pub pts: u64,
}

impl PcmFrame {
    /// 声道数
    pub fn channels(&self) -> usize {
        self.samples.channels()
    }

    /// 起始时间 (秒, 纳秒精度)
    pub fn start_time(&self) -> f64 {
        time::frames_to_seconds(self.pts, self.sample_rate)
    }

    /// 结束时间 (秒, 纳秒精度)
    pub fn end_time(&self) -> f64 {
        time::buffer_end_time(self.start_time(), self.nb_samples, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_分配与形状() {
        let s = PcmSamples::new(SampleFormat::S16, 2, 10);
        assert_eq!(s.channels(), 2);
        assert_eq!(s.len(), 10);
        assert_eq!(s.sample_format(), SampleFormat::S16p);
        let f = PcmSamples::new(SampleFormat::F32p, 1, 4);
        assert!(matches!(f, PcmSamples::F32(_)));
    }

    #[test]
    fn test_跨格式复制() {
        let mut src = PcmSamples::new(SampleFormat::S16, 1, 4);
        if let PcmSamples::S16(p) = &mut src {
            p[0].copy_from_slice(&[0, 16384, -32768, 1]);
        }
        let mut dst = PcmSamples::new(SampleFormat::F32, 1, 4);
        dst.copy_from(1, &src, 1, 2);
        assert_eq!(dst.sample_f32(0, 0), 0.0);
        assert_eq!(dst.sample_f32(0, 1), 0.5);
        assert_eq!(dst.sample_f32(0, 2), -1.0);
        assert_eq!(dst.truncated(2).len(), 2);
    }

    #[test]
    fn test_帧时间() {
        let frame = PcmFrame {
            samples: PcmSamples::new(SampleFormat::F32, 2, 1152),
            nb_samples: 1152,
            sample_rate: 44100,
            channel_layout: ChannelLayout::STEREO,
            pts: 1152,
        };
        assert_eq!(frame.start_time(), time::frames_to_seconds(1152, 44100));
        assert_eq!(frame.end_time(), time::frames_to_seconds(2304, 44100));
    }
}
