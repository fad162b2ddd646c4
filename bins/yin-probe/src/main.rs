//! yin-probe - MP3 信息探测工具
//!
//! 输出流信息 (文本或 JSON), 可选地把整条音轨解码为 WAV.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use yin_format::demuxers::mp3::SideHeader;
use yin_format::{DemuxOptions, Demuxer, FormatRegistry, IoContext, Mp3Demuxer, Mp3Metadata};
use yin_playback::{OutputFormat, PlaybackConfig, TrackDecoder, TrackSource, WavWriter};

/// WAV 样本格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SampleFormatArg {
    S16,
    F32,
}

impl From<SampleFormatArg> for OutputFormat {
    fn from(arg: SampleFormatArg) -> Self {
        match arg {
            SampleFormatArg::S16 => OutputFormat::S16,
            SampleFormatArg::F32 => OutputFormat::F32,
        }
    }
}

/// Yin MP3 信息探测工具
#[derive(Parser, Debug)]
#[command(name = "yin-probe", version, about = "纯 Rust MP3 信息探测工具")]
struct Cli {
    /// 输入文件路径或 http(s) URL
    input: String,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 解码并写入 WAV 文件
    #[arg(long, value_name = "OUT.wav")]
    decode: Option<PathBuf>,

    /// WAV 样本格式
    #[arg(long, value_enum, default_value_t = SampleFormatArg::F32)]
    format: SampleFormatArg,

    /// 最多解码的 PCM 帧数
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// 接受短于 3 秒的流
    #[arg(long)]
    allow_short: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,
}

/// 探测结果
#[derive(Serialize)]
struct ProbeOutput {
    filename: String,
    format_name: String,
    probe_score: u32,
    sample_rate: u32,
    channels: u32,
    bit_rate: u32,
    duration: f64,
    frames: u64,
    samples_per_frame: u32,
    vbr: bool,
    side_header: &'static str,
    encoder_delay: u32,
    encoder_padding: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    padding_start_frame: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lame_quality: Option<u32>,
    data_start: u64,
    data_end: u64,
    is_riff: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<DecodeSummary>,
}

/// 解码统计
#[derive(Serialize)]
struct DecodeSummary {
    output: String,
    frames: u64,
    buffers: usize,
    seconds: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.quiet {
        eprintln!(
            "yin-probe 版本 {} -- 纯 Rust MP3 探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入: {}", cli.input);
    }

    let source = parse_source(&cli.input);
    let mut output = probe(&cli, &source)?;

    if let Some(path) = &cli.decode {
        output.decoded = Some(decode_to_wav(&cli, source, path)?);
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("序列化探测结果失败")?
        );
    } else {
        print_text(&output);
    }
    Ok(())
}

fn parse_source(input: &str) -> TrackSource {
    if input.starts_with("http://") || input.starts_with("https://") {
        TrackSource::Url(input.to_string())
    } else {
        TrackSource::Path(PathBuf::from(input))
    }
}

fn demux_options(cli: &Cli) -> DemuxOptions {
    DemuxOptions {
        minimum_duration: cli.allow_short.then_some(0.0),
        ..Default::default()
    }
}

fn probe(cli: &Cli, source: &TrackSource) -> Result<ProbeOutput> {
    let mut io = match source {
        TrackSource::Url(url) => IoContext::open_url(url),
        _ => IoContext::open_read(&cli.input),
    }
    .with_context(|| format!("无法打开 '{}'", cli.input))?;

    let mut registry = FormatRegistry::new();
    yin_format::register_all(&mut registry);
    let probed = registry
        .probe_input(&mut io, source.name())
        .context("无法识别文件格式")?;
    if !cli.quiet {
        eprintln!("格式: {} (置信度: {})", probed.format_id, probed.score);
    }

    let mut demuxer = Mp3Demuxer::with_options(demux_options(cli));
    demuxer.open(&mut io).context("无法解析文件头部")?;
    let Some(meta) = demuxer.metadata() else {
        bail!("解封装后缺少元数据");
    };

    Ok(build_output(&cli.input, &probed.format_id.to_string(), probed.score, meta))
}

fn build_output(filename: &str, format_name: &str, score: u32, meta: &Mp3Metadata) -> ProbeOutput {
    let side_header = match meta.side_header {
        SideHeader::None => "none",
        SideHeader::Xing(_) => "xing",
        SideHeader::Vbri(_) => "vbri",
    };
    ProbeOutput {
        filename: filename.to_string(),
        format_name: format_name.to_string(),
        probe_score: score,
        sample_rate: meta.sample_rate,
        channels: meta.channels,
        bit_rate: meta.bit_rate,
        duration: meta.duration,
        frames: meta.frames,
        samples_per_frame: meta.samples_per_frame,
        vbr: meta.vbr,
        side_header,
        encoder_delay: meta.encoder_delay,
        encoder_padding: meta.encoder_padding,
        padding_start_frame: meta.padding_start_frame,
        lame_quality: meta.lame_quality,
        data_start: meta.data_start,
        data_end: meta.data_end,
        is_riff: meta.is_riff,
        decoded: None,
    }
}

fn decode_to_wav(cli: &Cli, source: TrackSource, path: &PathBuf) -> Result<DecodeSummary> {
    let config = PlaybackConfig {
        output_format: cli.format.into(),
        minimum_track_duration: cli.allow_short.then_some(0.0),
        ..Default::default()
    };
    let mut track = TrackDecoder::open(source, &config).context("无法打开解码上下文")?;
    let info = *track.info();
    let channels = u16::try_from(info.channels).context("声道数无效")?;

    let file = File::create(path).with_context(|| format!("无法创建 '{}'", path.display()))?;
    let mut writer = WavWriter::new(BufWriter::new(file), info.sample_rate, channels, config.output_format)?;

    let limit = cli.max_frames.unwrap_or(u64::MAX);
    let mut buffers = 0usize;
    let mut storage = Vec::new();
    while writer.frames_written() < limit {
        let Some(mut buffer) = track.next_buffer(storage)? else {
            break;
        };
        buffers += 1;
        let remaining = limit - writer.frames_written();
        let length = (buffer.length as u64).min(remaining) as usize;
        writer.write_planar(&buffer.samples, length)?;
        if buffer.is_last_buffer {
            break;
        }
        storage = buffer.take_samples();
    }

    let frames = writer.frames_written();
    writer.finish()?;
    if !cli.quiet {
        eprintln!("已写入 {} ({} 帧)", path.display(), frames);
    }
    Ok(DecodeSummary {
        output: path.display().to_string(),
        frames,
        buffers,
        seconds: frames as f64 / f64::from(info.sample_rate),
    })
}

fn print_text(output: &ProbeOutput) {
    println!("[STREAM]");
    println!("  文件名       : {}", output.filename);
    println!("  格式名称     : {}", output.format_name);
    println!("  探测置信度   : {}", output.probe_score);
    println!("  采样率       : {} Hz", output.sample_rate);
    println!("  声道数       : {}", output.channels);
    println!("  码率         : {} kbps", output.bit_rate / 1000);
    println!("  时长         : {:.3} 秒", output.duration);
    println!("  帧数         : {}", output.frames);
    println!("  每帧采样数   : {}", output.samples_per_frame);
    println!("  可变码率     : {}", if output.vbr { "是" } else { "否" });
    println!("  侧边头       : {}", output.side_header);
    println!("  编码器延迟   : {}", output.encoder_delay);
    println!("  编码器填充   : {}", output.encoder_padding);
    if let Some(frame) = output.padding_start_frame {
        println!("  裁剪起始帧   : {frame}");
    }
    if let Some(quality) = output.lame_quality {
        println!("  质量         : {quality}");
    }
    println!("  数据范围     : {}..{}", output.data_start, output.data_end);
    if output.is_riff {
        println!("  封装         : RIFF/WAVE");
    }
    println!("[/STREAM]");

    if let Some(decoded) = &output.decoded {
        println!();
        println!("[DECODE]");
        println!("  输出         : {}", decoded.output);
        println!("  PCM 帧数     : {}", decoded.frames);
        println!("  缓冲数       : {}", decoded.buffers);
        println!("  时长         : {:.3} 秒", decoded.seconds);
        println!("[/DECODE]");
    }
}
