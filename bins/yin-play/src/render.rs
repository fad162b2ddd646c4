//! 离线渲染.
//!
//! 用手动时钟驱动完整的解码线程与调度器管线, 把播放列表依次
//! (无缝或交叉淡化) 混音写入 WAV. 每推进一个时间片之前都等待
//! 解码线程完成已发出的请求, 因此渲染结果与机器快慢无关.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use yin_playback::{
    AudioClock, ManualClock, OfflineMixer, OutputFormat, PlaybackConfig, PlaybackEvent,
    PlaybackScheduler, TrackDecoder, TrackSource, WavWriter,
};

/// 每个时间片的时长 (秒)
const RENDER_QUANTUM: f64 = 0.02;

/// 连续多少次等待无响应后放弃
const MAX_IDLE_WAITS: u32 = 100;

const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// 渲染参数
pub struct RenderOptions {
    pub playlist: Vec<TrackSource>,
    pub output: PathBuf,
    pub config: PlaybackConfig,
    /// 第一首的起始位置 (秒)
    pub seek: Option<f64>,
}

/// 渲染统计
#[derive(Debug, Default)]
pub struct RenderSummary {
    pub frames: u64,
    pub tracks_played: usize,
    pub errors: usize,
}

/// 播放列表的推进状态
struct Playlist {
    sources: Vec<TrackSource>,
    current: usize,
    /// 下一首已交给调度器预加载
    next_preloaded: bool,
}

impl Playlist {
    fn next(&self) -> Option<&TrackSource> {
        self.sources.get(self.current + 1)
    }
}

pub fn render(options: RenderOptions) -> Result<RenderSummary> {
    let Some(first) = options.playlist.first().cloned() else {
        bail!("播放列表为空");
    };

    // 输出格式取第一首的采样率
    let info = *TrackDecoder::open(first.clone(), &options.config)
        .with_context(|| format!("无法打开 {first}"))?
        .info();
    let sample_rate = info.sample_rate;
    let channels = 2usize;
    info!("输出 {sample_rate} Hz, {channels} 声道 -> {}", options.output.display());

    let clock = ManualClock::new();
    let mixer = OfflineMixer::new(sample_rate, channels);
    let mut scheduler = PlaybackScheduler::new(
        options.config.clone(),
        Arc::new(clock.clone()),
        Box::new(mixer.clone()),
    )?;

    let file = File::create(&options.output)
        .with_context(|| format!("无法创建 '{}'", options.output.display()))?;
    let mut writer = WavWriter::new(
        BufWriter::new(file),
        sample_rate,
        channels as u16,
        OutputFormat::F32,
    )?;

    let mut playlist = Playlist {
        sources: options.playlist,
        current: 0,
        next_preloaded: false,
    };
    let mut summary = RenderSummary::default();
    let mut pending_seek = options.seek;
    let mut finished = false;

    info!("播放 [1/{}] {first}", playlist.sources.len());
    scheduler.load(first, 0.0, true);

    loop {
        wait_for_worker(&mut scheduler)?;
        if let Some(time) = pending_seek {
            if scheduler.track_info().is_some() {
                info!("定位到 {time:.3}s");
                scheduler.set_current_time(time);
                pending_seek = None;
                continue;
            }
        }

        scheduler.tick();
        for event in scheduler.take_events() {
            match event {
                PlaybackEvent::LastBufferLoaded => {
                    if let Some(next) = playlist.next().cloned() {
                        if !playlist.next_preloaded {
                            debug!("预加载 {next}");
                            scheduler.preload(next);
                            playlist.next_preloaded = true;
                        }
                    }
                }
                PlaybackEvent::Ended { preloaded_next } => {
                    summary.tracks_played += 1;
                    finished = !advance(&mut scheduler, &mut playlist, preloaded_next)?;
                }
                PlaybackEvent::Error(message) => {
                    warn!("[{}] {message}", playlist.current + 1);
                    summary.errors += 1;
                    finished = !advance(&mut scheduler, &mut playlist, false)?;
                }
                PlaybackEvent::TimeUpdate { .. } | PlaybackEvent::DecodingLatency(_) => {}
            }
        }

        clock.advance(RENDER_QUANTUM);
        let samples = mixer.render_until(clock.now());
        writer.write_interleaved(&samples)?;

        if finished && mixer.active_voices() == 0 {
            break;
        }
    }

    summary.frames = writer.frames_written();
    writer.finish()?;
    info!(
        "渲染完成: {} 首, {} 帧 ({:.3}s)",
        summary.tracks_played,
        summary.frames,
        summary.frames as f64 / f64::from(sample_rate)
    );
    Ok(summary)
}

/// 切换到下一首, 没有下一首时返回 false
fn advance(
    scheduler: &mut PlaybackScheduler,
    playlist: &mut Playlist,
    preloaded_next: bool,
) -> Result<bool> {
    let Some(next) = playlist.next().cloned() else {
        return Ok(false);
    };
    playlist.current += 1;
    info!(
        "播放 [{}/{}] {next}",
        playlist.current + 1,
        playlist.sources.len()
    );
    if preloaded_next && playlist.next_preloaded {
        scheduler.replace_with_preloaded_track()?;
    } else {
        scheduler.load(next, 0.0, true);
    }
    playlist.next_preloaded = false;
    Ok(true)
}

fn wait_for_worker(scheduler: &mut PlaybackScheduler) -> Result<()> {
    let mut idle_waits = 0;
    while scheduler.is_waiting_for_worker() {
        if scheduler.pump(Some(WAIT_TIMEOUT)) == 0 {
            idle_waits += 1;
            if idle_waits >= MAX_IDLE_WAITS {
                bail!("解码线程无响应");
            }
        } else {
            idle_waits = 0;
        }
    }
    Ok(())
}
