//! 解封装 + 解码 + 缓冲切分的端到端测试.
//!
//! 测试流在内存中生成: 静音帧 (全零侧信息) 与带 Xing/LAME 扩展的信息帧.

use yin::core::YinError;
use yin::format::demuxers::mp3::SideHeader;
use yin::format::{DemuxOptions, Demuxer, FormatId, IoContext, Mp3Demuxer};
use yin::playback::{PlaybackConfig, TrackDecoder, TrackSource};

/// MPEG-1 Layer III, 128kbps, 44100Hz, 立体声: 417 字节
const STEREO_HEADER: u32 = 0xFFFB_9000;
/// 同参数单声道
const MONO_HEADER: u32 = 0xFFFB_90C0;
const FRAME_BYTES: usize = 417;
const SAMPLES_PER_FRAME: usize = 1152;
const DECODER_DELAY: usize = 529;
const BLOCK: usize = 128;

fn silent_frame(header: u32) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_BYTES];
    frame[..4].copy_from_slice(&header.to_be_bytes());
    frame
}

fn cbr_stream(header: u32, frames: usize) -> Vec<u8> {
    silent_frame(header).repeat(frames)
}

/// 立体声 Xing 信息帧 + `frames` 个静音帧, LAME 扩展写入延迟与填充
fn xing_stream(frames: u32, delay: u32, padding: u32) -> Vec<u8> {
    let mut info = silent_frame(STEREO_HEADER);
    let mut xing = b"Xing".to_vec();
    xing.extend_from_slice(&3u32.to_be_bytes());
    xing.extend_from_slice(&frames.to_be_bytes());
    xing.extend_from_slice(&(frames * FRAME_BYTES as u32).to_be_bytes());
    let mut lame = b"LAME3.100".to_vec();
    lame.resize(21, 0);
    let packed = (delay << 12) | padding;
    lame.extend_from_slice(&[(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]);
    xing.extend_from_slice(&lame);
    info[36..36 + xing.len()].copy_from_slice(&xing);

    let mut data = info;
    data.extend(cbr_stream(STEREO_HEADER, frames as usize));
    data
}

fn config() -> PlaybackConfig {
    PlaybackConfig {
        buffer_time: 0.5,
        minimum_track_duration: Some(0.0),
        ..Default::default()
    }
}

/// 解码整条音轨, 返回 (未补齐的总帧数上界, 缓冲数)
fn decode_all(track: &mut TrackDecoder) -> (usize, usize) {
    let mut total = 0;
    let mut count = 0;
    let mut previous_end = 0.0;
    while let Some(buffer) = track.next_buffer(Vec::new()).unwrap() {
        assert!(
            (buffer.start_time - previous_end).abs() < 1e-6,
            "缓冲时间轴应首尾相接"
        );
        previous_end = buffer.end_time;
        total += buffer.length;
        count += 1;
        if buffer.is_last_buffer {
            assert_eq!(buffer.length % BLOCK, 0, "最后一个缓冲按块补齐");
            break;
        }
    }
    (total, count)
}

#[test]
fn test_cbr_流按缓冲解码() {
    let source = TrackSource::memory("cbr.mp3", cbr_stream(MONO_HEADER, 100));
    let mut track = TrackDecoder::open(source, &config()).unwrap();
    let info = *track.info();
    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.channels, 1);
    assert!(!info.vbr);
    // 无侧边头时默认编码器延迟 576
    assert_eq!(info.encoder_delay, 576);

    let (total, count) = decode_all(&mut track);
    let expected = 100 * SAMPLES_PER_FRAME - 576 - DECODER_DELAY;
    assert!(total >= expected && total < expected + BLOCK, "总帧数 {total}");
    assert_eq!(count, expected.div_ceil(22050));
    assert!(track.is_ended());
}

#[test]
fn test_xing_流的无缝裁剪() {
    let source = TrackSource::memory("xing.mp3", xing_stream(200, 576, 1000));
    let mut track = TrackDecoder::open(source, &config()).unwrap();
    let info = *track.info();
    assert!(info.vbr);
    assert_eq!(info.channels, 2);
    assert_eq!(info.frames, 200);
    assert!((info.duration - 200.0 * 1152.0 / 44100.0).abs() < 1e-9);

    let (total, _) = decode_all(&mut track);
    // 起始跳过编码器延迟与解码器延迟, 末尾裁掉超出解码器延迟的填充
    let expected = 200 * SAMPLES_PER_FRAME - 576 - DECODER_DELAY - (1000 - DECODER_DELAY);
    assert!(total >= expected && total < expected + BLOCK, "总帧数 {total}");
}

#[test]
fn test_一秒静音编码的总样本数() {
    // 40 帧 = 576 编码器延迟 + 44100 样本 + 1404 填充
    const ONE_SECOND: usize = 44100;
    let padding = 40 * SAMPLES_PER_FRAME - 576 - ONE_SECOND;
    let source = TrackSource::memory("one-second.mp3", xing_stream(40, 576, padding as u32));
    let mut track = TrackDecoder::open(source, &config()).unwrap();
    assert_eq!(track.info().sample_rate, 44100);

    let mut total = 0;
    let mut end_time = 0.0;
    while let Some(buffer) = track.next_buffer(Vec::new()).unwrap() {
        assert!(buffer.samples.iter().flatten().all(|&s| s == 0.0));
        total += buffer.length;
        end_time = buffer.end_time;
        if buffer.is_last_buffer {
            break;
        }
    }
    // 只允许最后一个缓冲按块补齐的误差
    assert!(total >= ONE_SECOND && total < ONE_SECOND + BLOCK, "总帧数 {total}");
    assert!((end_time - 1.0).abs() < BLOCK as f64 / 44100.0, "结束于 {end_time}");
}

#[test]
fn test_定位后从目标时间继续() {
    let source = TrackSource::memory("xing.mp3", xing_stream(400, 576, 0));
    let mut track = TrackDecoder::open(source, &config()).unwrap();
    let result = track.seek(4.0).unwrap();
    assert!(result.frame > 0);
    let buffer = track.next_buffer(Vec::new()).unwrap().unwrap();
    assert!((buffer.start_time - 4.0).abs() < 0.05, "起始 {}", buffer.start_time);
    assert!(!buffer.is_last_buffer);
}

#[test]
fn test_定位超出范围被钳制() {
    let source = TrackSource::memory("cbr.mp3", cbr_stream(MONO_HEADER, 200));
    let mut track = TrackDecoder::open(source, &config()).unwrap();
    let duration = track.info().duration;
    let result = track.seek(duration + 100.0).unwrap();
    assert!(result.time <= duration);
    let result = track.seek(-5.0).unwrap();
    assert_eq!(result.time, 0.0);
    assert_eq!(result.frame, 0);
}

#[test]
fn test_解封装元数据() {
    let mut io = IoContext::from_memory(xing_stream(200, 576, 1000));
    let mut demuxer = Mp3Demuxer::with_options(DemuxOptions {
        minimum_duration: Some(0.0),
        ..Default::default()
    });
    demuxer.open(&mut io).unwrap();
    let meta = demuxer.metadata().unwrap();
    assert_eq!(meta.data_start, FRAME_BYTES as u64);
    assert_eq!(meta.frames, 200);
    assert_eq!(meta.encoder_delay, 576);
    assert!(matches!(meta.side_header, SideHeader::Xing(_)));
    assert!(meta.toc.is_none());
}

#[test]
fn test_短于最短时长的流被拒绝() {
    let mut io = IoContext::from_memory(cbr_stream(MONO_HEADER, 20));
    let mut demuxer = Mp3Demuxer::with_options(DemuxOptions::default());
    let err = demuxer.open(&mut io).unwrap_err();
    assert!(matches!(err, YinError::Format(_)), "{err:?}");
}

#[test]
fn test_注册表识别_mp3() {
    let registry = yin::default_format_registry();
    let data = cbr_stream(MONO_HEADER, 10);
    let result = registry.probe(&data, Some("song.mp3")).unwrap();
    assert_eq!(result.format_id, FormatId::Mp3);
}
