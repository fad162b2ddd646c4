//! 播放调度器.
//!
//! 调度器持有已解码缓冲的队列, 为每个缓冲分配时钟上的起止时间,
//! 并实现定位、暂停/恢复、无缝衔接与交叉淡化. 解码在独立线程中进行,
//! 调度器从不阻塞: 缓冲没到就是欠载, 等下一个缓冲到达再接上.
//!
//! 时间有两套:
//! - 音轨时间: 缓冲的 `start_time`/`end_time`, 相对音轨起点
//! - 时钟时间: `AudioClock::now()`, 音源的 `started`/`stopped`
//!
//! 队列不变式: 队首缓冲的起点不晚于后面任何缓冲的起点.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use yin_core::time::seconds_to_frames;
use yin_core::{YinError, YinResult};

use crate::buffer::{DecodedPcmBuffer, SourceDescriptor, SourceId};
use crate::clock::AudioClock;
use crate::config::PlaybackConfig;
use crate::fade::{FADE_MINIMUM_VOLUME, GainEnvelope, fade_curve, fade_in_progress_volume};
use crate::output::AudioOutput;
use crate::pool::{BufferPool, DEFAULT_KEY_CAPACITY, PoolKey};
use crate::track::{TrackInfo, TrackSource};
use crate::worker::{DecodeWorker, FillExtra, FillType, WorkerLink, WorkerRequest, WorkerResponse};

/// 剩余时长低于该值的音源视为已播完
const EPSILON: f64 = 1e-9;

/// 调度器发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    TimeUpdate { current_time: f64, duration: f64 },
    /// 当前音轨播放结束 (交叉淡化时在下一首开始淡入时发出)
    Ended { preloaded_next: bool },
    /// 当前音轨的最后一个缓冲已解码
    LastBufferLoaded,
    /// 单个缓冲的解码耗时 (秒)
    DecodingLatency(f64),
    Error(String),
}

/// 预加载的下一首
#[derive(Debug)]
struct PreloadedTrack {
    source: TrackSource,
    info: Option<TrackInfo>,
    last_buffer_loaded: bool,
    /// 加载请求已发给解码线程
    issued: bool,
}

/// 播放调度器
pub struct PlaybackScheduler {
    config: PlaybackConfig,
    clock: Arc<dyn AudioClock>,
    output: Box<dyn AudioOutput>,
    link: WorkerLink,
    worker: Option<DecodeWorker>,
    pool: BufferPool,
    next_source_id: SourceId,

    source: Option<TrackSource>,
    track: Option<TrackInfo>,
    duration: f64,
    /// 当前音轨的缓冲, 按起点排序
    queue: VecDeque<SourceDescriptor>,
    /// 预加载音轨的缓冲
    background: VecDeque<SourceDescriptor>,
    /// 被替换但仍在淡出的音源
    retiring: Vec<SourceDescriptor>,
    /// 已播放的缓冲 (供可视化取样)
    played: VecDeque<SourceDescriptor>,

    paused: bool,
    current_time: f64,
    /// 已请求尚未到达的缓冲数量
    in_flight: usize,
    /// 尚未收到 `Idle` 的请求数量
    outstanding: usize,
    last_buffer_loaded: bool,
    ended_emitted: bool,
    preload: Option<PreloadedTrack>,

    volume: f32,
    muted: bool,
    master: GainEnvelope,
    /// `master` 开始前仍生效的曲线
    prior_master: GainEnvelope,
    /// 定位/换曲/暂停淡出的结束时间, 新缓冲不早于此开始
    fade_out_ended: Option<f64>,
    fade_in_started: f64,
    fade_in_length: f64,

    events: Vec<PlaybackEvent>,
}

impl PlaybackScheduler {
    /// 创建调度器并启动解码线程
    pub fn new(
        config: PlaybackConfig,
        clock: Arc<dyn AudioClock>,
        output: Box<dyn AudioOutput>,
    ) -> YinResult<Self> {
        config.validate()?;
        let (worker, link) = DecodeWorker::spawn(config.clone())?;
        let mut scheduler = Self::with_link(config, clock, output, link);
        scheduler.worker = Some(worker);
        Ok(scheduler)
    }

    /// 使用已有的解码通道 (解码端由调用方驱动)
    pub fn with_link(
        config: PlaybackConfig,
        clock: Arc<dyn AudioClock>,
        output: Box<dyn AudioOutput>,
        link: WorkerLink,
    ) -> Self {
        let pool = BufferPool::new(DEFAULT_KEY_CAPACITY, config.pool_capacity);
        Self {
            config,
            clock,
            output,
            link,
            worker: None,
            pool,
            next_source_id: 0,
            source: None,
            track: None,
            duration: 0.0,
            queue: VecDeque::new(),
            background: VecDeque::new(),
            retiring: Vec::new(),
            played: VecDeque::new(),
            paused: true,
            current_time: 0.0,
            in_flight: 0,
            outstanding: 0,
            last_buffer_loaded: false,
            ended_emitted: false,
            preload: None,
            volume: 1.0,
            muted: false,
            master: GainEnvelope::constant(1.0, 0.0),
            prior_master: GainEnvelope::constant(1.0, 0.0),
            fade_out_ended: None,
            fade_in_started: 0.0,
            fade_in_length: 0.0,
            events: Vec::new(),
        }
    }

    // ========================
    // 加载与定位
    // ========================

    /// 加载音轨, 从 `progress` (0..1) 处开始
    pub fn load(&mut self, source: TrackSource, progress: f64, resume_after_load: bool) {
        let now = self.clock.now();
        let stop_at = if self.is_audible() {
            let end = self.fade_out(now, self.config.track_change_fade_time);
            self.fade_out_ended = Some(end);
            end
        } else {
            self.fade_out_ended = None;
            now
        };
        let generation = self.link.bump_generation();
        self.retire_all(stop_at);
        self.preload = None;
        self.track = None;
        self.duration = 0.0;
        self.current_time = 0.0;
        self.last_buffer_loaded = false;
        self.ended_emitted = false;
        self.source = Some(source.clone());

        let count = self.config.sustained_buffer_count();
        self.in_flight = count;
        self.outstanding = 1;
        info!("加载 {source} (代号 {generation})");
        self.send(WorkerRequest::Load {
            generation,
            source,
            is_preload: false,
            buffer_fill_count: count,
            progress,
            resume_after_load,
        });
    }

    /// 预加载下一首, 当前音轨解码完后开始解码
    pub fn preload(&mut self, source: TrackSource) {
        if self.preload.as_ref().is_some_and(|p| p.source == source) {
            return;
        }
        if let Some(old) = self.preload.take() {
            debug!("替换预加载音轨 {}", old.source);
            self.discard_background();
        }
        self.preload = Some(PreloadedTrack {
            source,
            info: None,
            last_buffer_loaded: false,
            issued: false,
        });
        if self.last_buffer_loaded {
            self.issue_preload();
        }
    }

    /// 定位到音轨时间 `time`
    pub fn set_current_time(&mut self, time: f64) {
        let Some(source) = self.source.clone() else {
            return;
        };
        if self.track.is_none() {
            debug!("音轨尚未加载完成, 忽略定位");
            return;
        }
        let target = time.clamp(0.0, self.duration);
        if target != time {
            debug!(
                "{}",
                YinError::SeekOutOfRange {
                    requested: time,
                    duration: self.duration,
                }
            );
        }

        let now = self.clock.now();
        let stop_at = if self.is_audible() {
            let end = self.fade_out(now, self.config.seek_fade_time);
            self.fade_out_ended = Some(end);
            end
        } else {
            self.fade_out_ended = None;
            now
        };
        let generation = self.link.bump_generation();
        self.retire_all(stop_at);
        self.current_time = target;
        self.last_buffer_loaded = false;
        self.ended_emitted = false;

        let count = self.config.sustained_buffer_count();
        self.in_flight = count;
        self.outstanding = 1;

        let worker_on_preload = self.preload.as_ref().is_some_and(|p| p.issued);
        if worker_on_preload {
            // 解码线程已切换到预加载的音轨, 重新加载当前音轨
            if let Some(preload) = self.preload.as_mut() {
                preload.issued = false;
                preload.info = None;
                preload.last_buffer_loaded = false;
            }
            let progress = if self.duration > 0.0 {
                target / self.duration
            } else {
                0.0
            };
            debug!("定位到 {target:.3}s: 重新加载 {source}");
            self.send(WorkerRequest::Load {
                generation,
                source,
                is_preload: false,
                buffer_fill_count: count,
                progress,
                resume_after_load: false,
            });
        } else {
            debug!("定位到 {target:.3}s (代号 {generation})");
            self.send(WorkerRequest::Seek {
                generation,
                time: target,
                buffer_fill_count: count,
            });
        }
    }

    /// 卸载当前音轨并取消全部解码请求
    pub fn unload(&mut self) {
        let generation = self.link.bump_generation();
        self.send(WorkerRequest::CancelAll { generation });
        let now = self.clock.now();
        self.retire_all(now);
        let retiring: Vec<_> = self.retiring.drain(..).collect();
        for sd in retiring {
            self.output.stop(sd.id, now);
            self.push_played(sd);
        }
        self.source = None;
        self.track = None;
        self.preload = None;
        self.duration = 0.0;
        self.current_time = 0.0;
        self.in_flight = 0;
        self.outstanding = 0;
        self.last_buffer_loaded = false;
        self.ended_emitted = false;
        self.fade_out_ended = None;
    }

    /// 把预加载的音轨提升为当前音轨
    ///
    /// 当前音轨尚在播放的部分继续播完 (交叉淡化时淡出).
    pub fn replace_with_preloaded_track(&mut self) -> YinResult<()> {
        let Some(preload) = self.preload.take() else {
            return Err(YinError::InvalidArgument("没有预加载的音轨".into()));
        };
        if !preload.issued {
            // 预加载尚未开始, 直接加载
            self.load(preload.source, 0.0, !self.paused);
            return Ok(());
        }

        let now = self.clock.now();
        self.retiring.extend(self.queue.drain(..));
        self.queue = self.background.drain(..).collect();
        for sd in &mut self.queue {
            sd.background = false;
        }
        info!("切换到预加载音轨 {}", preload.source);
        self.source = Some(preload.source);
        self.track = preload.info;
        self.duration = preload.info.map_or(0.0, |i| i.duration);
        self.last_buffer_loaded = preload.last_buffer_loaded;
        self.ended_emitted = false;
        self.current_time = self.compute_current_time(now);
        if !self.paused {
            self.schedule_unscheduled(now, now + self.config.schedule_ahead_time);
        }
        if self.last_buffer_loaded {
            self.events.push(PlaybackEvent::LastBufferLoaded);
        }
        self.emit_time_update();
        self.request_more_buffers();
        Ok(())
    }

    // ========================
    // 暂停与音量
    // ========================

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        let now = self.clock.now();
        self.current_time = self.compute_current_time(now);
        let stop_at = if self.is_audible() {
            let end = self.fade_out(now, self.config.pause_resume_fade_time);
            self.fade_out_ended = Some(end);
            end
        } else {
            now
        };
        self.paused = true;

        // 位置只算到暂停时刻, 淡出部分恢复后重播
        let mut next_id = self.next_source_id;
        for sd in self.queue.iter_mut().chain(self.background.iter_mut()) {
            if !sd.is_scheduled() {
                continue;
            }
            if now > sd.started {
                sd.played_so_far = (sd.played_so_far + (now - sd.started)).min(sd.duration());
            }
            self.output.stop(sd.id, stop_at);
            sd.unschedule();
            // 旧音源淡出到 stop_at, 恢复时用新编号
            next_id += 1;
            sd.id = next_id;
        }
        self.next_source_id = next_id;
        while self
            .queue
            .front()
            .is_some_and(|sd| sd.remaining_duration() <= EPSILON)
        {
            if let Some(sd) = self.queue.pop_front() {
                self.push_played(sd);
            }
        }
        let retiring: Vec<_> = self.retiring.drain(..).collect();
        for sd in retiring {
            self.output.stop(sd.id, stop_at);
            self.push_played(sd);
        }
        debug!("暂停于 {:.3}s", self.current_time);
    }

    pub fn play(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        let now = self.clock.now();
        // 暂停的淡出结束前不重叠播放
        let start_at = (now + self.config.schedule_ahead_time)
            .max(self.fade_out_ended.unwrap_or(now));
        self.fade_in(start_at, self.config.pause_resume_fade_time);
        self.schedule_unscheduled(now, start_at);
        debug!("从 {:.3}s 恢复播放", self.current_time);
    }

    /// 设置音量 (0..=1)
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.volume = volume;
        if self.muted {
            return;
        }
        let now = self.clock.now();
        if now < self.fade_in_started + self.fade_in_length {
            // 淡入进行中, 按新音量重建曲线
            self.fade_in(self.fade_in_started, self.fade_in_length);
        } else {
            self.set_master(GainEnvelope::constant(volume, now));
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        let now = self.clock.now();
        let fade = self.config.mute_unmute_fade_time;
        if muted {
            let end = self.fade_out(now, fade);
            self.muted = true;
            self.set_master(GainEnvelope::constant(0.0, end));
        } else {
            self.muted = false;
            self.fade_in(now, fade);
        }
    }

    // ========================
    // 驱动
    // ========================

    /// 处理解码线程的响应, `timeout` 为 Some 时最多阻塞等待第一条
    ///
    /// 返回处理的响应数量.
    pub fn pump(&mut self, timeout: Option<Duration>) -> usize {
        let mut handled = 0;
        if let Some(timeout) = timeout {
            if let Some(response) = self.link.recv_timeout(timeout) {
                self.handle_response(response);
                handled += 1;
            }
        }
        while let Some(response) = self.link.try_recv() {
            self.handle_response(response);
            handled += 1;
        }
        handled
    }

    /// 推进时间: 回收播完的音源, 更新当前时间, 检查结束并补充缓冲
    pub fn tick(&mut self) {
        self.pump(None);
        let now = self.clock.now();
        self.release_finished(now);
        if self.source.is_none() {
            return;
        }
        self.current_time = self.compute_current_time(now);
        self.emit_time_update();
        self.check_ended(now);
        self.request_more_buffers();
    }

    /// 处理一条解码响应
    pub fn handle_response(&mut self, response: WorkerResponse) {
        let current = self.link.generation();
        let generation = response.generation();
        if generation != current {
            let stale = YinError::StaleResponse {
                generation,
                current,
            };
            if let WorkerResponse::BufferFilled { mut buffer, .. } = response {
                debug!("{stale}, 回收缓冲");
                self.pool.release(buffer.pool_key(), buffer.take_samples());
            }
            return;
        }

        match response {
            WorkerResponse::BufferFilled {
                fill_type,
                buffer,
                extra,
                ..
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.events
                    .push(PlaybackEvent::DecodingLatency(buffer.decoding_latency));
                let to_background = self.preload.as_ref().is_some_and(|p| p.issued)
                    && matches!(fill_type, FillType::Background | FillType::Normal);
                if to_background {
                    self.accept_background(buffer, extra);
                } else {
                    self.accept_foreground(fill_type, buffer, extra);
                }
            }
            WorkerResponse::Idle { .. } => {
                self.outstanding = self.outstanding.saturating_sub(1);
                if self.outstanding == 0 {
                    self.in_flight = 0;
                }
            }
            WorkerResponse::Error {
                message,
                track_fatal,
                ..
            } => {
                self.outstanding = 0;
                self.in_flight = 0;
                if self.preload.as_ref().is_some_and(|p| p.issued) {
                    warn!("预加载失败: {message}");
                    self.preload = None;
                    self.discard_background();
                } else {
                    warn!("解码失败 (致命: {track_fatal}): {message}");
                    // 已解出的缓冲继续播放, 不再请求, 由上层切换音轨
                    self.last_buffer_loaded = true;
                    self.ended_emitted = true;
                }
                self.events.push(PlaybackEvent::Error(message));
            }
        }
    }

    /// 是否有请求尚未完成
    pub fn is_waiting_for_worker(&self) -> bool {
        self.outstanding > 0
    }

    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// 把 `offset` 秒后正在播放的缓冲样本 (各声道平均) 复制到 `out`
    ///
    /// 没有音源覆盖该时刻时填零并返回 false.
    pub fn samples_scheduled_at(&self, offset: f64, out: &mut [f32]) -> bool {
        out.fill(0.0);
        let t = self.clock.now() + offset;
        let found = self
            .queue
            .iter()
            .chain(self.background.iter())
            .chain(self.retiring.iter())
            .chain(self.played.iter())
            .find(|sd| sd.contains(t));
        let Some(sd) = found else {
            return false;
        };
        let buffer = &sd.buffer;
        let start = sd.frame_at(t);
        let count = out.len().min(buffer.length - start);
        let scale = 1.0 / buffer.samples.len().max(1) as f32;
        for plane in &buffer.samples {
            for (dst, src) in out[..count].iter_mut().zip(&plane[start..start + count]) {
                *dst += *src * scale;
            }
        }
        true
    }

    // ========================
    // 访问器
    // ========================

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn track_info(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    pub fn source(&self) -> Option<&TrackSource> {
        self.source.as_ref()
    }

    /// 预加载的音轨已有缓冲可以衔接
    pub fn has_preloaded_track(&self) -> bool {
        self.preload.as_ref().is_some_and(|p| p.info.is_some())
    }

    pub fn is_last_buffer_loaded(&self) -> bool {
        self.last_buffer_loaded
    }

    /// 当前音轨排队中的缓冲数量
    pub fn queued_buffers(&self) -> usize {
        self.queue.len()
    }

    pub fn played_buffers(&self) -> impl Iterator<Item = &DecodedPcmBuffer> {
        self.played.iter().map(|sd| &sd.buffer)
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ========================
    // 缓冲到达
    // ========================

    fn accept_foreground(
        &mut self,
        fill_type: FillType,
        buffer: DecodedPcmBuffer,
        extra: Option<FillExtra>,
    ) {
        let now = self.clock.now();
        if let Some(extra) = extra {
            self.track = Some(extra.track);
            self.duration = extra.track.duration;
        }
        let is_last = buffer.is_last_buffer;
        let end_time = buffer.end_time;
        let id = self.next_id();
        let mut sd = SourceDescriptor::new(id, buffer, false);

        match fill_type {
            FillType::FirstLoad | FillType::FirstSeek | FillType::Replacement => {
                // 旧队列在发出请求时已经退役
                let fade_pending = self.fade_out_ended.take();
                let start_at =
                    (now + self.config.schedule_ahead_time).max(fade_pending.unwrap_or(now));
                self.current_time = sd.buffer.start_time;
                if !self.paused {
                    let fade = if fill_type == FillType::FirstSeek {
                        self.config.seek_fade_time
                    } else {
                        self.config.track_change_fade_time
                    };
                    if fade_pending.is_some() {
                        self.fade_in(start_at, fade);
                    }
                    start_source(self.output.as_mut(), &mut sd, start_at);
                }
                self.queue.push_back(sd);
                if self.paused && extra.is_some_and(|e| e.resume_after_load) {
                    self.play();
                }
            }
            FillType::Background | FillType::Normal => {
                if !self.paused {
                    let at = self.append_start(now, now + self.config.schedule_ahead_time);
                    start_source(self.output.as_mut(), &mut sd, at);
                }
                self.queue.push_back(sd);
            }
        }

        if is_last {
            self.last_buffer_queued(end_time);
        }
    }

    fn accept_background(&mut self, buffer: DecodedPcmBuffer, extra: Option<FillExtra>) {
        let is_last = buffer.is_last_buffer;
        if let Some(preload) = self.preload.as_mut() {
            if let Some(extra) = extra {
                preload.info = Some(extra.track);
            }
            preload.last_buffer_loaded |= is_last;
        }
        let id = self.next_id();
        self.background
            .push_back(SourceDescriptor::new(id, buffer, true));
        if !self.paused {
            let now = self.clock.now();
            self.schedule_background(now, now + self.config.schedule_ahead_time);
        }
    }

    fn last_buffer_queued(&mut self, end_time: f64) {
        self.last_buffer_loaded = true;
        self.events.push(PlaybackEvent::LastBufferLoaded);
        let threshold =
            self.duration - self.config.buffer_time() - self.config.crossfade_duration;
        if end_time < threshold {
            debug!(
                "实际时长 {end_time:.3}s 短于元数据时长 {:.3}s",
                self.duration
            );
            self.duration = end_time;
        }
        self.issue_preload();
    }

    fn issue_preload(&mut self) {
        let Some(preload) = self.preload.as_mut().filter(|p| !p.issued) else {
            return;
        };
        preload.issued = true;
        let source = preload.source.clone();
        let generation = self.link.bump_generation();
        let count = self.config.sustained_buffer_count();
        self.in_flight = count;
        self.outstanding = 1;
        info!("预加载 {source} (代号 {generation})");
        self.send(WorkerRequest::Load {
            generation,
            source,
            is_preload: true,
            buffer_fill_count: count,
            progress: 0.0,
            resume_after_load: false,
        });
    }

    // ========================
    // 时间安排
    // ========================

    /// 下一个前台缓冲的开始时间: 紧接上一个缓冲, 欠载时从 `earliest` 起
    fn append_start(&self, now: f64, earliest: f64) -> f64 {
        let previous_end = self
            .queue
            .back()
            .filter(|sd| sd.is_scheduled())
            .map(|sd| sd.stopped)
            .or_else(|| {
                self.retiring
                    .iter()
                    .map(|sd| sd.stopped)
                    .reduce(f64::max)
            });
        match previous_end {
            Some(end) if end >= now => end,
            _ => earliest,
        }
    }

    /// 依次安排所有未调度的前台与预加载音源
    fn schedule_unscheduled(&mut self, now: f64, earliest: f64) {
        let mut at = self.append_start(now, earliest);
        for sd in self.queue.iter_mut() {
            if sd.is_scheduled() {
                at = sd.stopped;
                continue;
            }
            start_source(self.output.as_mut(), sd, at);
            at = sd.stopped;
        }
        self.schedule_background(now, earliest);
    }

    /// 安排预加载音轨的音源
    ///
    /// 第一个缓冲接在当前音轨末尾, 配置了交叉淡化时提前开始并互相淡入淡出.
    fn schedule_background(&mut self, now: f64, earliest: f64) {
        if !self.last_buffer_loaded {
            return;
        }
        let foreground_end = self
            .queue
            .back()
            .filter(|sd| sd.is_scheduled())
            .map(|sd| sd.stopped);
        let crossfade = self.config.crossfade_duration;

        for i in 0..self.background.len() {
            if self.background[i].is_scheduled() {
                continue;
            }
            let (at, envelope) = if i == 0 {
                match foreground_end {
                    Some(end) if crossfade > 0.0 => {
                        let start = (end - crossfade).max(earliest);
                        let length = end - start;
                        if length > 0.0 {
                            let fade_out = GainEnvelope::fade_out(1.0, 1.0, start, length);
                            for sd in self.queue.iter_mut().filter(|sd| sd.stopped > start) {
                                sd.envelope = Some(fade_out);
                                self.output.set_source_envelope(sd.id, Some(fade_out));
                            }
                            debug!("交叉淡化: {start:.3} 起 {length:.3}s");
                            (start, Some(GainEnvelope::fade_in(start, length)))
                        } else {
                            (start, None)
                        }
                    }
                    Some(end) if end >= now => (end, None),
                    _ => (earliest, None),
                }
            } else {
                let previous = &self.background[i - 1];
                (previous.stopped, previous.envelope)
            };
            let sd = &mut self.background[i];
            sd.envelope = envelope;
            start_source(self.output.as_mut(), sd, at);
        }
    }

    fn compute_current_time(&self, now: f64) -> f64 {
        let Some(head) = self.queue.front() else {
            if self.last_buffer_loaded && self.track.is_some() {
                return self.duration;
            }
            return self.current_time;
        };
        let played = if head.is_scheduled() && !self.paused {
            head.played_so_far + (now - head.started).max(0.0)
        } else {
            head.played_so_far
        };
        let time = head.buffer.start_time + played.min(head.duration());
        if self.duration > 0.0 {
            time.min(self.duration)
        } else {
            time
        }
    }

    fn release_finished(&mut self, now: f64) {
        if self.paused {
            return;
        }
        while self
            .queue
            .front()
            .is_some_and(|sd| sd.is_scheduled() && sd.stopped <= now)
        {
            if let Some(sd) = self.queue.pop_front() {
                self.push_played(sd);
            }
        }
        let (finished, still): (Vec<_>, Vec<_>) = self
            .retiring
            .drain(..)
            .partition(|sd| sd.stopped <= now);
        self.retiring = still;
        for sd in finished {
            self.push_played(sd);
        }
    }

    fn check_ended(&mut self, now: f64) {
        if self.ended_emitted || !self.last_buffer_loaded {
            return;
        }
        let crossfading = self.config.crossfade_duration > 0.0
            && self
                .background
                .front()
                .is_some_and(|sd| sd.is_scheduled() && now >= sd.started);
        if self.queue.is_empty() || crossfading {
            self.ended_emitted = true;
            let preloaded_next = self.has_preloaded_track();
            info!("播放结束 (下一首已预加载: {preloaded_next})");
            self.events.push(PlaybackEvent::Ended { preloaded_next });
        }
    }

    /// 按水位补充缓冲请求
    fn request_more_buffers(&mut self) {
        if self.last_buffer_loaded || self.preload.as_ref().is_some_and(|p| p.issued) {
            return;
        }
        let Some(track) = self.track else {
            return;
        };
        let now = self.clock.now();
        let queued = self
            .queue
            .iter()
            .filter(|sd| !sd.is_scheduled() || sd.stopped > now)
            .count();
        let need = self
            .config
            .sustained_buffer_count()
            .saturating_sub(queued + self.in_flight);
        let room = self
            .config
            .max_buffers_in_flight
            .saturating_sub(self.in_flight);
        let count = need.min(room);
        if count == 0 || count < self.config.min_buffers_to_request {
            return;
        }

        let key = PoolKey::new(track.channels, track.sample_rate);
        let frames = seconds_to_frames(self.config.buffer_time(), track.sample_rate) as usize;
        let reusable = count.min(self.pool.available(key));
        let storage = (0..reusable)
            .map(|_| self.pool.acquire(key, frames))
            .collect();
        let generation = self.link.generation();
        self.in_flight += count;
        self.outstanding += 1;
        self.send(WorkerRequest::FillBuffers {
            generation,
            count,
            storage,
        });
    }

    // ========================
    // 音源与增益
    // ========================

    fn next_id(&mut self) -> SourceId {
        self.next_source_id += 1;
        self.next_source_id
    }

    fn is_audible(&self) -> bool {
        !self.paused
            && self
                .queue
                .iter()
                .chain(self.background.iter())
                .any(SourceDescriptor::is_scheduled)
    }

    /// 前台与预加载的音源全部退役: 已开始的在 `stop_at` 停止, 其余直接回收
    fn retire_all(&mut self, stop_at: f64) {
        let old: Vec<_> = self
            .queue
            .drain(..)
            .chain(self.background.drain(..))
            .collect();
        for mut sd in old {
            if sd.is_scheduled() && sd.started < stop_at {
                self.output.stop(sd.id, stop_at);
                sd.stopped = sd.stopped.min(stop_at);
                self.retiring.push(sd);
            } else {
                if sd.is_scheduled() {
                    self.output.stop(sd.id, sd.started);
                }
                self.recycle(sd);
            }
        }
    }

    fn discard_background(&mut self) {
        let now = self.clock.now();
        let old: Vec<_> = self.background.drain(..).collect();
        for sd in old {
            if sd.is_scheduled() {
                self.output.stop(sd.id, now);
            }
            self.recycle(sd);
        }
    }

    fn push_played(&mut self, sd: SourceDescriptor) {
        self.played.push_back(sd);
        while self.played.len() > self.config.played_buffers_retained {
            if let Some(old) = self.played.pop_front() {
                self.recycle(old);
            }
        }
    }

    fn recycle(&mut self, mut sd: SourceDescriptor) {
        let key = sd.buffer.pool_key();
        self.pool.release(key, sd.buffer.take_samples());
    }

    fn send(&mut self, request: WorkerRequest) {
        if !self.link.send(request) {
            warn!("解码线程已退出");
            self.outstanding = 0;
            self.in_flight = 0;
            self.events
                .push(PlaybackEvent::Error("解码线程已退出".into()));
        }
    }

    fn emit_time_update(&mut self) {
        self.events.push(PlaybackEvent::TimeUpdate {
            current_time: self.current_time,
            duration: self.duration,
        });
    }

    fn set_master(&mut self, envelope: GainEnvelope) {
        if self.master.start < envelope.start {
            self.prior_master = self.master;
        }
        self.master = envelope;
        self.output.set_gain_curve(envelope);
    }

    fn current_gain(&self, now: f64) -> f32 {
        if !self.muted && now >= self.fade_in_started && now < self.fade_in_started + self.fade_in_length {
            return self.volume
                * fade_in_progress_volume(self.fade_in_started, self.fade_in_length, now);
        }
        if now < self.master.start {
            return self.prior_master.value_at(now);
        }
        self.master.value_at(now)
    }

    /// 主增益从最低音量淡入到当前音量, 长度为 0 时直接恢复
    fn fade_in(&mut self, start: f64, length: f64) {
        if self.muted {
            self.set_master(GainEnvelope::constant(0.0, start));
            return;
        }
        if length <= 0.0 {
            self.fade_in_length = 0.0;
            self.set_master(GainEnvelope::constant(self.volume, start));
            return;
        }
        let curve = fade_curve(FADE_MINIMUM_VOLUME * self.volume, self.volume);
        self.fade_in_started = start;
        self.fade_in_length = length;
        self.set_master(GainEnvelope::new(curve, start, length));
    }

    /// 主增益从当前值淡出, 返回淡出结束时间
    fn fade_out(&mut self, now: f64, length: f64) -> f64 {
        if length <= 0.0 {
            return now;
        }
        let from = self.current_gain(now);
        self.fade_in_length = 0.0;
        self.set_master(GainEnvelope::fade_out(from, self.volume, now, length));
        now + length
    }
}

/// 在 `when` 开始音源, 输出端失败只记录日志
fn start_source(output: &mut dyn AudioOutput, sd: &mut SourceDescriptor, when: f64) {
    sd.started = when;
    sd.stopped = when + sd.remaining_duration();
    if let Err(e) = output.start(sd, when, sd.played_so_far) {
        warn!("音源 {} 启动失败: {e}", sd.id);
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.link.send(WorkerRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::constant_buffer;
    use crate::clock::ManualClock;
    use crate::output::{OutputEvent, RecordingOutput};
    use crate::worker::WorkerEndpoint;

    const AHEAD: f64 = 0.05;

    struct Harness {
        scheduler: PlaybackScheduler,
        endpoint: WorkerEndpoint,
        clock: ManualClock,
        output: RecordingOutput,
    }

    fn config() -> PlaybackConfig {
        PlaybackConfig {
            seek_fade_time: 0.0,
            track_change_fade_time: 0.0,
            pause_resume_fade_time: 0.0,
            mute_unmute_fade_time: 0.0,
            schedule_ahead_time: AHEAD,
            ..Default::default()
        }
    }

    fn harness(config: PlaybackConfig) -> Harness {
        let (link, endpoint) = WorkerLink::pair();
        let clock = ManualClock::new();
        clock.set(10.0);
        let output = RecordingOutput::new();
        let scheduler = PlaybackScheduler::with_link(
            config,
            Arc::new(clock.clone()),
            Box::new(output.clone()),
            link,
        );
        Harness {
            scheduler,
            endpoint,
            clock,
            output,
        }
    }

    fn info(duration: f64) -> TrackInfo {
        TrackInfo {
            duration,
            sample_rate: 1000,
            channels: 2,
            frames: 0,
            encoder_delay: 0,
            encoder_padding: 0,
            vbr: false,
        }
    }

    /// 首个缓冲附带的信息
    fn first_extra(duration: f64, preload: bool) -> Option<FillExtra> {
        Some(FillExtra {
            base_time: 0.0,
            track: info(duration),
            is_preload: preload,
            resume_after_load: true,
        })
    }

    fn source(name: &str) -> TrackSource {
        TrackSource::memory(name, vec![0u8; 4])
    }

    impl Harness {
        /// 取出解码端收到的全部请求
        fn requests(&self) -> Vec<WorkerRequest> {
            self.endpoint.requests.try_iter().collect()
        }

        fn respond(&mut self, response: WorkerResponse) {
            self.endpoint.responses.send(response).unwrap();
            self.scheduler.pump(None);
        }

        /// 发送一个 0.1 秒的缓冲
        fn fill(
            &mut self,
            fill_type: FillType,
            start: f64,
            last: bool,
            extra: Option<FillExtra>,
        ) {
            let mut buffer = constant_buffer(0.5, 100, start);
            buffer.is_last_buffer = last;
            let generation = self.scheduler.link.generation();
            self.respond(WorkerResponse::BufferFilled {
                generation,
                fill_type,
                buffer,
                extra,
            });
        }

        fn starts(&self) -> Vec<(SourceId, f64, f64, bool)> {
            self.output
                .starts()
                .into_iter()
                .filter_map(|e| match e {
                    OutputEvent::Start {
                        id,
                        when,
                        duration,
                        background,
                        ..
                    } => Some((id, when, duration, background)),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_加载请求按水位填充() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let requests = h.requests();
        assert!(matches!(
            requests.as_slice(),
            [WorkerRequest::Load {
                generation: 1,
                is_preload: false,
                buffer_fill_count: 3,
                resume_after_load: true,
                ..
            }]
        ));
        assert!(h.scheduler.is_waiting_for_worker());
    }

    #[test]
    fn test_首个缓冲按提前量开始且后续无缝衔接() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        assert!(!h.scheduler.is_paused());
        h.fill(FillType::Normal, 0.1, false, None);
        h.fill(FillType::Normal, 0.2, false, None);

        let starts = h.starts();
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[0].1, 10.0 + AHEAD);
        assert_eq!(starts[1].1, starts[0].1 + starts[0].2);
        assert_eq!(starts[2].1, starts[1].1 + starts[1].2);
        assert_eq!(h.scheduler.duration(), 10.0);
    }

    #[test]
    fn test_欠载后从当前时间重新开始() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.clock.advance(1.0);
        h.fill(FillType::Normal, 0.1, false, None);
        let starts = h.starts();
        assert_eq!(starts[1].1, 11.0 + AHEAD);
    }

    #[test]
    fn test_背压补充请求() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.respond(WorkerResponse::Idle { generation: 1 });
        h.requests();

        h.scheduler.tick();
        let requests = h.requests();
        let [WorkerRequest::FillBuffers { count, .. }] = requests.as_slice() else {
            panic!("期望补充请求, 实际 {requests:?}");
        };
        assert_eq!(*count, 2);

        // 请求未完成时不重复请求
        h.scheduler.tick();
        assert!(h.requests().is_empty());
    }

    #[test]
    fn test_过期缓冲回收且不调度() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.scheduler.tick();
        let stale_generation = h.scheduler.link.generation();

        h.scheduler.set_current_time(5.0);
        assert_eq!(h.scheduler.current_time(), 5.0);
        let key = PoolKey::new(2, 1000);
        let before = h.scheduler.pool().available(key);
        let starts_before = h.starts().len();

        h.respond(WorkerResponse::BufferFilled {
            generation: stale_generation,
            fill_type: FillType::Normal,
            buffer: constant_buffer(0.5, 100, 0.1),
            extra: None,
        });
        assert_eq!(h.scheduler.pool().available(key), before + 1);
        assert_eq!(h.starts().len(), starts_before);
    }

    #[test]
    fn test_定位替换队列() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, false, None);
        h.requests();

        h.clock.advance(0.08);
        let seek_at = h.clock.now();
        h.scheduler.set_current_time(4.0);
        let requests = h.requests();
        assert!(matches!(
            requests.as_slice(),
            [WorkerRequest::Seek { time, .. }] if *time == 4.0
        ));
        // 尚未开始的第二个缓冲直接丢弃
        let starts = h.starts();
        assert_eq!(h.output.stop_time(starts[1].0), Some(starts[1].1));
        assert_eq!(h.output.stop_time(starts[0].0), Some(seek_at));

        let mut extra = first_extra(10.0, false);
        if let Some(e) = extra.as_mut() {
            e.base_time = 3.9;
            e.resume_after_load = false;
        }
        h.fill(FillType::FirstSeek, 3.9, false, extra);
        let starts = h.starts();
        assert_eq!(starts[2].1, seek_at + AHEAD);
        assert_eq!(h.scheduler.current_time(), 3.9);
    }

    #[test]
    fn test_暂停恢复不改变当前时间() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, false, None);
        h.clock.advance(AHEAD + 0.03);
        h.scheduler.pause();
        let paused_at = h.scheduler.current_time();
        assert!((paused_at - 0.03).abs() < 1e-9);

        for _ in 0..5 {
            h.scheduler.play();
            h.scheduler.pause();
            h.clock.advance(0.5);
            h.scheduler.tick();
            assert!((h.scheduler.current_time() - paused_at).abs() < 1e-9);
        }

        h.scheduler.play();
        let starts = h.starts();
        let [.., head, next] = starts.as_slice() else {
            panic!("期望恢复后重新开始两个缓冲");
        };
        // 从暂停处继续, 只剩 70ms
        assert!((head.2 - 0.07).abs() < 1e-9);
        assert_eq!(next.1, head.1 + head.2);
        assert_ne!(head.0, starts[0].0);
    }

    /// 默认淡入淡出时间下开始播放, 返回第一个缓冲开始的时钟时间
    fn playing_with_default_fades(h: &mut Harness) -> f64 {
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        for i in 1..5 {
            h.fill(FillType::Normal, i as f64 * 0.1, false, None);
        }
        h.starts()[0].1
    }

    #[test]
    fn test_默认淡出下反复暂停位置不漂移() {
        let mut h = harness(PlaybackConfig::default());
        let first = playing_with_default_fades(&mut h);
        h.clock.set(first + 0.3);
        h.scheduler.tick();
        h.scheduler.pause();
        let paused_at = h.scheduler.current_time();
        assert!((paused_at - 0.3).abs() < 1e-9);

        // 时钟不动时反复暂停恢复
        for _ in 0..5 {
            h.scheduler.play();
            h.scheduler.pause();
            assert!((h.scheduler.current_time() - paused_at).abs() < 1e-9);
        }
        h.clock.advance(1.0);
        h.scheduler.tick();
        assert!((h.scheduler.current_time() - paused_at).abs() < 1e-9);
    }

    #[test]
    fn test_恢复播放等待暂停淡出结束() {
        let config = PlaybackConfig::default();
        let fade = config.pause_resume_fade_time;
        let mut h = harness(config);
        let first = playing_with_default_fades(&mut h);
        h.clock.set(first + 0.25);
        h.scheduler.tick();
        let before = h.starts().len();

        let pause_at = h.clock.now();
        h.scheduler.pause();
        // 正在播放的音源淡出到结束才停止
        let playing = h.starts()[2].0;
        assert_eq!(h.output.stop_time(playing), Some(pause_at + fade));

        h.clock.advance(0.05);
        h.scheduler.play();
        let resumed: Vec<_> = h.starts().into_iter().skip(before).collect();
        assert!(!resumed.is_empty());
        assert!(resumed.iter().all(|s| s.1 >= pause_at + fade - 1e-9));
        assert!(resumed.iter().all(|s| s.0 != playing));
        // 从暂停处接着放: 第三个缓冲还剩 50ms
        assert!((resumed[0].1 - (pause_at + fade)).abs() < 1e-9);
        assert!((resumed[0].2 - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_恢复淡入开始前再次暂停沿用当前增益() {
        let mut h = harness(PlaybackConfig::default());
        let first = playing_with_default_fades(&mut h);
        h.clock.set(first + 0.3);
        h.scheduler.tick();
        h.scheduler.pause();
        h.scheduler.play();
        h.scheduler.pause();
        let now = h.clock.now();
        let curves: Vec<_> = h
            .output
            .events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::GainCurve(env) => Some(env),
                _ => None,
            })
            .collect();
        let last = curves.last().expect("期望增益曲线");
        // 第一次淡出此刻仍为满音量
        assert_eq!(last.start, now);
        assert!((last.value_at(now) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_低音量暂停淡出不升高增益() {
        let mut h = harness(PlaybackConfig::default());
        h.scheduler.set_volume(0.1);
        let first = playing_with_default_fades(&mut h);
        h.clock.set(first + 0.3);
        h.scheduler.tick();
        h.scheduler.pause();
        let now = h.clock.now();
        let fade_out = h
            .output
            .events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                OutputEvent::GainCurve(env) => Some(env),
                _ => None,
            })
            .expect("期望暂停淡出曲线");
        assert_eq!(fade_out.start, now);
        for i in 0..=10 {
            let v = fade_out.value_at(now + i as f64 * 0.02);
            assert!(v <= 0.1 + 1e-6, "增益 {v} 高于音量");
        }
        assert!((fade_out.value_at(now + 1.0) - 0.1 * FADE_MINIMUM_VOLUME).abs() < 1e-6);
    }

    #[test]
    fn test_最后一个缓冲后发出结束事件() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(0.2, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, true, None);
        assert!(h.scheduler.is_last_buffer_loaded());
        assert!(h.scheduler.take_events().contains(&PlaybackEvent::LastBufferLoaded));

        h.clock.advance(0.2);
        h.scheduler.tick();
        assert!(!h.scheduler.take_events().iter().any(|e| matches!(e, PlaybackEvent::Ended { .. })));
        h.clock.advance(AHEAD + 0.01);
        h.scheduler.tick();
        let events = h.scheduler.take_events();
        assert!(events.contains(&PlaybackEvent::Ended {
            preloaded_next: false
        }));
        assert_eq!(h.scheduler.current_time(), 0.2);
        // 只发出一次
        h.scheduler.tick();
        assert!(!h.scheduler.take_events().iter().any(|e| matches!(e, PlaybackEvent::Ended { .. })));
    }

    #[test]
    fn test_预加载无缝衔接() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        h.scheduler.preload(source("b.mp3"));
        // 当前音轨解码完成前不发出预加载
        assert_eq!(h.requests().len(), 1);

        let extra = first_extra(0.2, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, true, None);
        let requests = h.requests();
        assert!(matches!(
            requests.as_slice(),
            [WorkerRequest::Load {
                is_preload: true,
                generation: 2,
                ..
            }]
        ));

        let extra = first_extra(5.0, true);
        h.fill(FillType::Background, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, false, None);
        let starts = h.starts();
        assert_eq!(starts.len(), 4);
        let a_last = starts[1];
        let b_first = starts[2];
        assert!(b_first.3);
        assert_eq!(b_first.1, a_last.1 + a_last.2);
        assert_eq!(starts[3].1, b_first.1 + b_first.2);

        h.clock.advance(AHEAD + 0.21);
        h.scheduler.tick();
        assert!(h.scheduler.take_events().contains(&PlaybackEvent::Ended {
            preloaded_next: true
        }));
        h.scheduler.replace_with_preloaded_track().unwrap();
        assert_eq!(h.scheduler.duration(), 5.0);
        assert_eq!(h.scheduler.queued_buffers(), 2);
        assert!(h.scheduler.current_time() < 0.02);

        // 提升后恢复按水位请求
        h.respond(WorkerResponse::Idle { generation: 2 });
        h.scheduler.tick();
        assert!(h
            .requests()
            .iter()
            .any(|r| matches!(r, WorkerRequest::FillBuffers { generation: 2, .. })));
    }

    #[test]
    fn test_交叉淡化提前开始() {
        let mut h = harness(PlaybackConfig {
            crossfade_duration: 0.05,
            ..config()
        });
        h.scheduler.load(source("a.mp3"), 0.0, true);
        h.scheduler.preload(source("b.mp3"));
        let extra = first_extra(0.2, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        h.fill(FillType::Normal, 0.1, true, None);
        let extra = first_extra(5.0, true);
        h.fill(FillType::Background, 0.0, false, extra);

        let starts = h.starts();
        let a_end = starts[1].1 + starts[1].2;
        let b_start = starts[2].1;
        assert!((a_end - b_start - 0.05).abs() < 1e-9);

        let envelopes: Vec<_> = h
            .output
            .events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::SourceEnvelope { id, envelope } => Some((id, envelope)),
                _ => None,
            })
            .collect();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].0, starts[1].0);
        let fade_out = envelopes[0].1.unwrap();
        assert!((fade_out.value_at(b_start) - 1.0).abs() < 1e-6);
        assert!((fade_out.value_at(a_end) - FADE_MINIMUM_VOLUME).abs() < 1e-6);

        // 下一首开始淡入时即发出结束事件
        h.clock.set(b_start);
        h.scheduler.tick();
        assert!(h.scheduler.take_events().contains(&PlaybackEvent::Ended {
            preloaded_next: true
        }));
    }

    #[test]
    fn test_没有预加载时无法替换() {
        let mut h = harness(config());
        assert!(matches!(
            h.scheduler.replace_with_preloaded_track(),
            Err(YinError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_音量与静音() {
        let mut h = harness(config());
        h.scheduler.set_volume(0.5);
        h.scheduler.set_muted(true);
        h.scheduler.set_volume(2.0);
        assert_eq!(h.scheduler.volume(), 1.0);
        let curves: Vec<_> = h
            .output
            .events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::GainCurve(env) => Some(env),
                _ => None,
            })
            .collect();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].value_at(20.0), 0.5);
        assert_eq!(curves[1].value_at(20.0), 0.0);

        h.scheduler.set_muted(false);
        let events = h.output.events();
        let Some(OutputEvent::GainCurve(env)) = events.last() else {
            panic!("期望增益曲线");
        };
        assert_eq!(env.value_at(20.0), 1.0);
    }

    #[test]
    fn test_解码错误上报() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        h.respond(WorkerResponse::Error {
            generation: 1,
            message: "解码错误".into(),
            track_fatal: true,
        });
        assert!(!h.scheduler.is_waiting_for_worker());
        let events = h.scheduler.take_events();
        assert_eq!(events, vec![PlaybackEvent::Error("解码错误".into())]);
        h.scheduler.tick();
        assert!(h.requests().iter().all(|r| !matches!(r, WorkerRequest::FillBuffers { .. })));
    }

    #[test]
    fn test_可视化取样() {
        let mut h = harness(config());
        h.scheduler.load(source("a.mp3"), 0.0, true);
        let extra = first_extra(10.0, false);
        h.fill(FillType::FirstLoad, 0.0, false, extra);
        let mut out = [1.0f32; 8];
        assert!(!h.scheduler.samples_scheduled_at(0.0, &mut out));
        assert!(out.iter().all(|s| *s == 0.0));
        assert!(h.scheduler.samples_scheduled_at(AHEAD + 0.01, &mut out));
        assert!(out.iter().all(|s| *s == 0.5));
    }
}
