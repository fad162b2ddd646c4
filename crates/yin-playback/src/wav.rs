//! WAV (RIFF WAVE) 写入.
//!
//! 写入流程:
//! 1. `WavWriter::new()` - 写入 RIFF 和 fmt 块, 预留 data 块大小
//! 2. `write_*()` - 追加样本
//! 3. `finish()` - 回填 RIFF 大小和 data 块大小

use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use yin_core::{YinError, YinResult};

use crate::config::OutputFormat;

/// WAV 音频格式码: PCM 整数
const WAV_FORMAT_PCM: u16 = 0x0001;
/// WAV 音频格式码: IEEE 浮点
const WAV_FORMAT_IEEE_FLOAT: u16 = 0x0003;

/// RIFF 大小字段的偏移
const RIFF_SIZE_OFFSET: u64 = 4;
/// data 块大小字段的偏移: 12 (RIFF) + 24 (fmt) + 4 (data 标签)
const DATA_SIZE_OFFSET: u64 = 40;

/// WAV 写入器
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    format: OutputFormat,
    channels: u16,
    data_written: u64,
}

impl<W: Write + Seek> WavWriter<W> {
    /// 写入头部
    pub fn new(mut inner: W, sample_rate: u32, channels: u16, format: OutputFormat) -> YinResult<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(YinError::InvalidArgument(format!(
                "WAV 参数无效: {sample_rate} Hz, {channels} 声道"
            )));
        }
        let (audio_format, bits_per_sample) = match format {
            OutputFormat::S16 => (WAV_FORMAT_PCM, 16u16),
            OutputFormat::F32 => (WAV_FORMAT_IEEE_FLOAT, 32u16),
        };
        let block_align = channels * (bits_per_sample / 8);
        let byte_rate = sample_rate * u32::from(block_align);

        inner.write_all(b"RIFF")?;
        inner.write_u32::<LittleEndian>(0)?; // 占位, finish 中回填
        inner.write_all(b"WAVE")?;

        inner.write_all(b"fmt ")?;
        inner.write_u32::<LittleEndian>(16)?;
        inner.write_u16::<LittleEndian>(audio_format)?;
        inner.write_u16::<LittleEndian>(channels)?;
        inner.write_u32::<LittleEndian>(sample_rate)?;
        inner.write_u32::<LittleEndian>(byte_rate)?;
        inner.write_u16::<LittleEndian>(block_align)?;
        inner.write_u16::<LittleEndian>(bits_per_sample)?;

        inner.write_all(b"data")?;
        inner.write_u32::<LittleEndian>(0)?;

        debug!("WAV 写入头部: {sample_rate} Hz, {channels} 声道, {bits_per_sample} 位");
        Ok(Self {
            inner,
            format,
            channels,
            data_written: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// 已写入的 PCM 帧数
    pub fn frames_written(&self) -> u64 {
        let bytes_per_sample = match self.format {
            OutputFormat::S16 => 2,
            OutputFormat::F32 => 4,
        };
        self.data_written / (bytes_per_sample * u64::from(self.channels))
    }

    /// 写入交错样本
    pub fn write_interleaved(&mut self, samples: &[f32]) -> YinResult<()> {
        for &sample in samples {
            self.write_sample(sample)?;
        }
        Ok(())
    }

    /// 写入平面样本的前 `length` 帧, 声道不足时重复最后一个声道
    pub fn write_planar(&mut self, planes: &[Vec<f32>], length: usize) -> YinResult<()> {
        if planes.is_empty() {
            return Ok(());
        }
        for i in 0..length {
            for c in 0..usize::from(self.channels) {
                let plane = &planes[c.min(planes.len() - 1)];
                self.write_sample(plane.get(i).copied().unwrap_or(0.0))?;
            }
        }
        Ok(())
    }

    fn write_sample(&mut self, sample: f32) -> YinResult<()> {
        match self.format {
            OutputFormat::S16 => {
                let value = (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                self.inner.write_i16::<LittleEndian>(value)?;
                self.data_written += 2;
            }
            OutputFormat::F32 => {
                self.inner.write_f32::<LittleEndian>(sample)?;
                self.data_written += 4;
            }
        }
        Ok(())
    }

    /// 回填大小字段并返回底层写入器
    pub fn finish(mut self) -> YinResult<W> {
        let data_size = u32::try_from(self.data_written)
            .map_err(|_| YinError::InvalidArgument("WAV 数据超过 4 GiB".into()))?;
        let riff_size = 36 + data_size;

        self.inner.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(riff_size)?;
        self.inner.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(data_size)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        debug!("WAV 写入尾部: riff_size={riff_size}, data_size={data_size}");
        Ok(self.inner)
    }
}
