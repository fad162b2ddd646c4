//! # yin-play
//!
//! 离线播放器: 按播放列表解码、调度并混音, 把结果写入 WAV.
//!
//! 与实时播放共用同一条解码线程与调度器管线, 只是时钟由渲染循环手动推进,
//! 因此输出可以逐样本检查无缝衔接与交叉淡化.

mod logging;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use yin_playback::{PlaybackConfig, TrackSource};

use crate::render::RenderOptions;

/// Yin 离线播放器
#[derive(Parser, Debug)]
#[command(name = "yin-play", version, about = "Yin 离线播放器, 把播放列表渲染为 WAV")]
struct Args {
    /// 输入文件路径或 URL (支持 http/https), 按顺序播放
    #[arg(required = true)]
    files: Vec<String>,

    /// 输出 WAV 文件
    #[arg(short, long, default_value = "yin-play.wav")]
    output: PathBuf,

    /// 交叉淡化时长 (秒), 覆盖配置文件
    #[arg(long, value_name = "S")]
    crossfade: Option<f64>,

    /// JSON 播放配置
    #[arg(long, value_name = "cfg.json")]
    config: Option<PathBuf>,

    /// 第一首的起始位置 (秒)
    #[arg(long, value_name = "S")]
    seek: Option<f64>,

    /// 日志详细程度 (-v debug, -vv yin trace, -vvv 全部 trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("yin-play", args.verbose)?;

    let mut config = match &args.config {
        Some(path) => PlaybackConfig::from_json_file(path)
            .with_context(|| format!("无法读取配置 '{}'", path.display()))?,
        None => PlaybackConfig::default(),
    };
    if let Some(crossfade) = args.crossfade {
        config.crossfade_duration = crossfade;
    }
    config.validate().context("播放配置无效")?;

    if let Some(seek) = args.seek {
        if !seek.is_finite() || seek < 0.0 {
            bail!("起始位置无效: {seek}");
        }
    }

    let playlist = args.files.iter().map(|f| parse_source(f)).collect();
    let summary = render::render(RenderOptions {
        playlist,
        output: args.output.clone(),
        config,
        seek: args.seek,
    })?;

    info!(
        "已写入 {} ({} 首, {} 个错误)",
        args.output.display(),
        summary.tracks_played,
        summary.errors
    );
    Ok(())
}

fn parse_source(input: &str) -> TrackSource {
    if input.starts_with("http://") || input.starts_with("https://") {
        TrackSource::Url(input.to_string())
    } else {
        TrackSource::Path(PathBuf::from(input))
    }
}
