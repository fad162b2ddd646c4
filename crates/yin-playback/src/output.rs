//! 音频输出.
//!
//! 调度器只通过 [`AudioOutput`] 描述 "何时开始/停止哪段缓冲" 与增益曲线,
//! 真正的混音在输出端完成. 这里提供两种实现:
//! - [`RecordingOutput`]: 只记录调用, 供测试断言调度时间
//! - [`OfflineMixer`]: 按时钟时间把音源混成交错 f32 PCM

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use yin_core::YinResult;

use crate::buffer::{SourceDescriptor, SourceId};
use crate::fade::GainEnvelope;
use crate::pool::PlanarStorage;

/// 音频输出端
pub trait AudioOutput: Send {
    /// 在时钟时间 `when` 开始播放 `source`, 从缓冲内 `offset` 秒处开始
    fn start(&mut self, source: &SourceDescriptor, when: f64, offset: f64) -> YinResult<()>;

    /// 在 `when` 停止音源 (早于开始时间则音源不会发声)
    fn stop(&mut self, id: SourceId, when: f64);

    /// 追加一段主增益曲线, 自其起点起生效
    fn set_gain_curve(&mut self, envelope: GainEnvelope);

    /// 设置或清除单个音源的增益包络
    fn set_source_envelope(&mut self, id: SourceId, envelope: Option<GainEnvelope>);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 记录下来的输出调用
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Start {
        id: SourceId,
        when: f64,
        offset: f64,
        duration: f64,
        /// 缓冲起点的音轨时间
        start_time: f64,
        is_last_buffer: bool,
        background: bool,
    },
    Stop {
        id: SourceId,
        when: f64,
    },
    GainCurve(GainEnvelope),
    SourceEnvelope {
        id: SourceId,
        envelope: Option<GainEnvelope>,
    },
}

/// 记录所有调用的输出端, 克隆后共享同一份记录
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        lock(&self.events).clone()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    /// 所有 `Start` 事件
    pub fn starts(&self) -> Vec<OutputEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| matches!(e, OutputEvent::Start { .. }))
            .cloned()
            .collect()
    }

    /// 音源最后一次被要求停止的时间
    pub fn stop_time(&self, id: SourceId) -> Option<f64> {
        lock(&self.events).iter().rev().find_map(|e| match e {
            OutputEvent::Stop { id: stopped, when } if *stopped == id => Some(*when),
            _ => None,
        })
    }

    fn push(&self, event: OutputEvent) {
        lock(&self.events).push(event);
    }
}

impl AudioOutput for RecordingOutput {
    fn start(&mut self, source: &SourceDescriptor, when: f64, offset: f64) -> YinResult<()> {
        self.push(OutputEvent::Start {
            id: source.id,
            when,
            offset,
            duration: source.duration() - offset,
            start_time: source.buffer.start_time,
            is_last_buffer: source.buffer.is_last_buffer,
            background: source.background,
        });
        Ok(())
    }

    fn stop(&mut self, id: SourceId, when: f64) {
        self.push(OutputEvent::Stop { id, when });
    }

    fn set_gain_curve(&mut self, envelope: GainEnvelope) {
        self.push(OutputEvent::GainCurve(envelope));
    }

    fn set_source_envelope(&mut self, id: SourceId, envelope: Option<GainEnvelope>) {
        self.push(OutputEvent::SourceEnvelope { id, envelope });
    }
}

/// 混音器中的一个声部
#[derive(Debug)]
struct Voice {
    id: SourceId,
    samples: PlanarStorage,
    length: usize,
    /// 输出采样率下的起始帧
    start_frame: i64,
    /// 缓冲内的起始偏移 (帧)
    offset_frames: usize,
    stop_frame: i64,
    envelope: Option<GainEnvelope>,
}

impl Voice {
    fn end_frame(&self) -> i64 {
        let natural = self.start_frame + (self.length.saturating_sub(self.offset_frames)) as i64;
        natural.min(self.stop_frame)
    }
}

#[derive(Debug)]
struct MixerState {
    sample_rate: u32,
    channels: usize,
    voices: Vec<Voice>,
    /// 按起点排序的主增益曲线
    master: Vec<GainEnvelope>,
    /// 已渲染到的帧
    rendered: i64,
}

impl MixerState {
    fn frame_of(&self, time: f64) -> i64 {
        (time * f64::from(self.sample_rate)).round() as i64
    }

    fn master_gain(&self, t: f64) -> f32 {
        let index = self.master.partition_point(|e| e.start <= t);
        match index {
            0 => self.master.first().map_or(1.0, |e| e.value_at(t)),
            i => self.master[i - 1].value_at(t),
        }
    }
}

/// 离线混音器
///
/// 音源在输出采样率下按 `round(when * sample_rate)` 对齐到帧,
/// 单声道音源复制到所有输出声道. 克隆后共享同一份状态.
#[derive(Debug, Clone)]
pub struct OfflineMixer {
    state: Arc<Mutex<MixerState>>,
}

impl OfflineMixer {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MixerState {
                sample_rate,
                channels: channels.max(1),
                voices: Vec::new(),
                master: Vec::new(),
                rendered: 0,
            })),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        lock(&self.state).sample_rate
    }

    pub fn channels(&self) -> usize {
        lock(&self.state).channels
    }

    /// 仍可能发声的音源数量
    pub fn active_voices(&self) -> usize {
        lock(&self.state).voices.len()
    }

    /// 从上次渲染位置渲染到时钟时间 `time`, 返回交错样本
    pub fn render_until(&self, time: f64) -> Vec<f32> {
        let mut state = lock(&self.state);
        let end = state.frame_of(time);
        let start = state.rendered;
        if end <= start {
            return Vec::new();
        }
        let channels = state.channels;
        let rate = f64::from(state.sample_rate);
        let mut out = vec![0.0f32; (end - start) as usize * channels];

        for voice in &state.voices {
            let from = voice.start_frame.max(start);
            let to = voice.end_frame().min(end);
            for frame in from..to {
                let index = (frame - voice.start_frame) as usize + voice.offset_frames;
                if index >= voice.length {
                    break;
                }
                let t = frame as f64 / rate;
                let gain = voice.envelope.map_or(1.0, |e| e.value_at(t));
                let base = (frame - start) as usize * channels;
                for c in 0..channels {
                    let plane = &voice.samples[c.min(voice.samples.len() - 1)];
                    out[base + c] += plane[index] * gain;
                }
            }
        }

        for frame in start..end {
            let gain = state.master_gain(frame as f64 / rate);
            let base = (frame - start) as usize * channels;
            for sample in &mut out[base..base + channels] {
                *sample *= gain;
            }
        }

        state.voices.retain(|v| v.end_frame() > end);
        state.rendered = end;
        out
    }
}

impl AudioOutput for OfflineMixer {
    fn start(&mut self, source: &SourceDescriptor, when: f64, offset: f64) -> YinResult<()> {
        let mut state = lock(&self.state);
        let buffer = &source.buffer;
        if buffer.samples.is_empty() || buffer.length == 0 {
            return Ok(());
        }
        if buffer.sample_rate != state.sample_rate {
            debug!(
                "音源 {} 采样率 {} 与输出 {} 不同, 按输出采样率播放",
                source.id, buffer.sample_rate, state.sample_rate
            );
        }
        let offset_frames =
            ((offset * f64::from(buffer.sample_rate)).round() as usize).min(buffer.length);
        let voice = Voice {
            id: source.id,
            samples: buffer
                .samples
                .iter()
                .map(|plane| plane[..buffer.length].to_vec())
                .collect(),
            length: buffer.length,
            start_frame: state.frame_of(when),
            offset_frames,
            stop_frame: i64::MAX,
            envelope: source.envelope,
        };
        state.voices.retain(|v| v.id != source.id);
        state.voices.push(voice);
        Ok(())
    }

    fn stop(&mut self, id: SourceId, when: f64) {
        let mut state = lock(&self.state);
        let frame = state.frame_of(when);
        if let Some(voice) = state.voices.iter_mut().find(|v| v.id == id) {
            voice.stop_frame = voice.stop_frame.min(frame);
        }
    }

    fn set_gain_curve(&mut self, envelope: GainEnvelope) {
        let mut state = lock(&self.state);
        // 新曲线覆盖其起点之后的旧曲线
        state.master.retain(|e| e.start < envelope.start);
        state.master.push(envelope);
    }

    fn set_source_envelope(&mut self, id: SourceId, envelope: Option<GainEnvelope>) {
        let mut state = lock(&self.state);
        if let Some(voice) = state.voices.iter_mut().find(|v| v.id == id) {
            voice.envelope = envelope;
        }
    }
}
