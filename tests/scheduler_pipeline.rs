//! 调度器 + 真实解码线程的端到端测试.
//!
//! 时钟由测试手动推进, 每次操作后等待解码线程完成全部请求,
//! 因此调度时间是确定的.

use std::sync::Arc;
use std::time::Duration;

use yin::playback::{
    AudioClock, ManualClock, OfflineMixer, OutputEvent, PlaybackConfig, PlaybackEvent,
    PlaybackScheduler, PoolKey, RecordingOutput, TrackSource,
};

const MONO_HEADER: u32 = 0xFFFB_90C0;
const FRAME_BYTES: usize = 417;
const AHEAD: f64 = 0.05;

fn silent_track(name: &str, frames: usize) -> TrackSource {
    let mut frame = vec![0u8; FRAME_BYTES];
    frame[..4].copy_from_slice(&MONO_HEADER.to_be_bytes());
    TrackSource::memory(name, frame.repeat(frames))
}

fn config(crossfade: f64) -> PlaybackConfig {
    PlaybackConfig {
        buffer_time: 0.5,
        crossfade_duration: crossfade,
        schedule_ahead_time: AHEAD,
        seek_fade_time: 0.0,
        track_change_fade_time: 0.0,
        pause_resume_fade_time: 0.0,
        mute_unmute_fade_time: 0.0,
        minimum_track_duration: Some(0.0),
        ..Default::default()
    }
}

struct Pipeline {
    scheduler: PlaybackScheduler,
    clock: ManualClock,
    output: RecordingOutput,
}

impl Pipeline {
    fn new(config: PlaybackConfig) -> Self {
        let clock = ManualClock::new();
        let output = RecordingOutput::new();
        let scheduler = PlaybackScheduler::new(
            config,
            Arc::new(clock.clone()),
            Box::new(output.clone()),
        )
        .unwrap();
        Self {
            scheduler,
            clock,
            output,
        }
    }

    /// 等待解码线程完成所有已发出的请求
    fn settle(&mut self) {
        for _ in 0..200 {
            if !self.scheduler.is_waiting_for_worker() {
                return;
            }
            self.scheduler.pump(Some(Duration::from_millis(50)));
        }
        panic!("解码线程无响应");
    }

    fn advance(&mut self, seconds: f64) -> Vec<PlaybackEvent> {
        self.clock.advance(seconds);
        self.scheduler.tick();
        self.settle();
        self.scheduler.take_events()
    }

    /// 前台或预加载音源的 (开始时间, 时长)
    fn starts(&self, background: bool) -> Vec<(f64, f64)> {
        self.output
            .starts()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Start {
                    when,
                    duration,
                    background: bg,
                    ..
                } if bg == background => Some((when, duration)),
                _ => None,
            })
            .collect()
    }
}

fn has_ended(events: &[PlaybackEvent]) -> Option<bool> {
    events.iter().find_map(|e| match e {
        PlaybackEvent::Ended { preloaded_next } => Some(*preloaded_next),
        _ => None,
    })
}

#[test]
fn test_加载后按提前量开始播放() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    p.settle();

    assert!(!p.scheduler.is_paused());
    let info = *p.scheduler.track_info().unwrap();
    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.channels, 1);

    let starts = p.starts(false);
    // 6 秒水位, 每个缓冲 0.5 秒
    assert_eq!(starts.len(), 12);
    assert!((starts[0].0 - AHEAD).abs() < 1e-9);
    for pair in starts.windows(2) {
        assert!((pair[0].0 + pair[0].1 - pair[1].0).abs() < 1e-9, "缓冲之间不留空隙");
    }
}

#[test]
fn test_播放中按水位补充缓冲() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    p.settle();
    let before = p.starts(false).len();

    p.advance(2.0);
    let starts = p.starts(false);
    assert!(starts.len() > before, "播放消耗后应补充缓冲");
    for pair in starts.windows(2) {
        assert!((pair[0].0 + pair[0].1 - pair[1].0).abs() < 1e-9);
    }
    assert!(p.scheduler.played_buffers().count() > 0);
}

#[test]
fn test_预加载无缝衔接() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 40), 0.0, true);
    p.settle();
    assert!(p.scheduler.is_last_buffer_loaded());
    let events = p.scheduler.take_events();
    assert!(events.contains(&PlaybackEvent::LastBufferLoaded));

    p.scheduler.preload(silent_track("b.mp3", 40));
    p.settle();
    assert!(p.scheduler.has_preloaded_track());

    let foreground = p.starts(false);
    let background = p.starts(true);
    let (last_when, last_duration) = *foreground.last().unwrap();
    assert!(!background.is_empty());
    assert!(
        (last_when + last_duration - background[0].0).abs() < 1e-9,
        "下一首的第一个缓冲紧接上一首的最后一个缓冲"
    );

    let end = last_when + last_duration;
    let events = p.advance(end + 0.01);
    assert_eq!(has_ended(&events), Some(true));

    p.scheduler.replace_with_preloaded_track().unwrap();
    assert_eq!(p.scheduler.source().and_then(|s| s.name()), Some("b.mp3"));
    assert!(p.scheduler.current_time() < 0.05);
    assert!(p.scheduler.queued_buffers() > 0);
}

#[test]
fn test_交叉淡化提前开始下一首() {
    let crossfade = 0.5;
    let mut p = Pipeline::new(config(crossfade));
    p.scheduler.load(silent_track("a.mp3", 40), 0.0, true);
    p.settle();
    p.scheduler.preload(silent_track("b.mp3", 40));
    p.settle();

    let (last_when, last_duration) = *p.starts(false).last().unwrap();
    let end = last_when + last_duration;
    let background = p.starts(true);
    assert!((background[0].0 - (end - crossfade)).abs() < 1e-9);

    // 与下一首重叠的前台音源都被设置了淡出包络
    let faded = p
        .output
        .events()
        .into_iter()
        .filter(|e| matches!(e, OutputEvent::SourceEnvelope { envelope: Some(_), .. }))
        .count();
    assert!(faded >= 1);

    // 下一首开始淡入时当前音轨即告结束
    let events = p.advance(background[0].0 + 0.01);
    assert_eq!(has_ended(&events), Some(true));
}

#[test]
fn test_重新加载时回收旧缓冲() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    p.settle();
    let queued = p.scheduler.queued_buffers();
    assert!(queued > 0);

    // 新加载覆盖旧请求, 尚未发声的旧缓冲回到缓冲池
    p.scheduler.load(silent_track("b.mp3", 40), 0.0, true);
    p.settle();
    let stats = p.scheduler.pool().stats();
    assert!(stats.releases >= queued as u64, "归还 {}", stats.releases);
    assert!(p.scheduler.pool().available(PoolKey::new(1, 44100)) > 0);

    assert_eq!(p.scheduler.source().and_then(|s| s.name()), Some("b.mp3"));
    let b_duration = p.scheduler.duration();
    assert!(b_duration < 1.1, "时长应来自新音轨: {b_duration}");
}

#[test]
fn test_过期缓冲不被调度() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    // 第一首的缓冲还没处理就切换
    p.scheduler.load(silent_track("b.mp3", 40), 0.0, true);
    p.settle();

    assert_eq!(p.scheduler.source().and_then(|s| s.name()), Some("b.mp3"));
    // 只有新音轨的缓冲被安排播放
    assert_eq!(p.starts(false).len(), p.scheduler.queued_buffers());
    assert!(p.scheduler.duration() < 1.1);
}

#[test]
fn test_定位后从目标时间播放() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    p.settle();
    p.advance(0.5);

    p.scheduler.set_current_time(5.0);
    p.settle();
    assert!((p.scheduler.current_time() - 5.0).abs() < 0.05);
    let now = p.clock.now();
    let last = p.output.starts().into_iter().rev().find_map(|e| match e {
        OutputEvent::Start { start_time, when, .. } if start_time < 5.1 => Some((start_time, when)),
        _ => None,
    });
    let (start_time, when) = last.unwrap();
    assert!((start_time - 5.0).abs() < 0.05);
    assert!((when - (now + AHEAD)).abs() < 1e-9);
}

#[test]
fn test_暂停与恢复保持进度() {
    let mut p = Pipeline::new(config(0.0));
    p.scheduler.load(silent_track("a.mp3", 400), 0.0, true);
    p.settle();

    p.advance(1.0);
    let before = p.scheduler.current_time();
    assert!((before - (1.0 - AHEAD)).abs() < 1e-6);

    p.scheduler.pause();
    assert!(p.scheduler.is_paused());
    p.advance(5.0);
    assert!((p.scheduler.current_time() - before).abs() < 1e-6);

    p.scheduler.play();
    p.advance(AHEAD + 0.5);
    assert!((p.scheduler.current_time() - (before + 0.5)).abs() < 1e-6);
}

#[test]
fn test_离线混音渲染() {
    let clock = ManualClock::new();
    let mixer = OfflineMixer::new(44100, 2);
    let mut scheduler = PlaybackScheduler::new(
        config(0.0),
        Arc::new(clock.clone()),
        Box::new(mixer.clone()),
    )
    .unwrap();
    scheduler.load(silent_track("a.mp3", 40), 0.0, true);
    for _ in 0..200 {
        if !scheduler.is_waiting_for_worker() {
            break;
        }
        scheduler.pump(Some(Duration::from_millis(50)));
    }
    assert!(mixer.active_voices() > 0);

    let mut rendered = Vec::new();
    for _ in 0..100 {
        clock.advance(0.02);
        scheduler.tick();
        rendered.extend(mixer.render_until(clock.now()));
    }
    let frames = rendered.len() / 2;
    assert!((frames as i64 - 88200).abs() <= 2, "渲染帧数 {frames}");
    assert!(rendered.iter().all(|s| s.abs() < 1e-3), "静音流渲染为静音");
    assert_eq!(mixer.active_voices(), 0);
}
