//! 解码线程.
//!
//! 解码线程一次只处理一个请求, 与调度器之间只通过 mpsc 通道交换消息,
//! 缓冲存储随消息转移所有权. 两侧共享的只有请求代号计数器:
//! 调度器递增, 解码线程只读.
//!
//! `Load`/`Seek`/`CancelAll` 会清空排队中的请求; 正在进行的填充在两个缓冲
//! 之间检查代号, 代号变化即放弃剩余部分. 已经发出的缓冲不会撤回,
//! 由调度器按代号丢弃.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use yin_core::YinResult;

use crate::buffer::DecodedPcmBuffer;
use crate::config::PlaybackConfig;
use crate::pool::PlanarStorage;
use crate::track::{TrackDecoder, TrackInfo, TrackSource};

/// 缓冲的填充类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillType {
    /// 加载后的第一个缓冲
    FirstLoad,
    /// 定位后的第一个缓冲
    FirstSeek,
    /// 预加载的下一首的第一个缓冲
    Background,
    /// 后续缓冲
    Normal,
    /// 已预加载的音轨被重新作为前台加载时的第一个缓冲
    Replacement,
}

/// 调度器发给解码线程的请求
#[derive(Debug)]
pub enum WorkerRequest {
    Load {
        generation: u64,
        source: TrackSource,
        is_preload: bool,
        buffer_fill_count: usize,
        /// 起始进度 (0..1)
        progress: f64,
        resume_after_load: bool,
    },
    Seek {
        generation: u64,
        time: f64,
        buffer_fill_count: usize,
    },
    FillBuffers {
        generation: u64,
        count: usize,
        /// 回收的存储, 解码时优先复用
        storage: Vec<PlanarStorage>,
    },
    CancelAll {
        generation: u64,
    },
    Shutdown,
}

impl WorkerRequest {
    /// 是否使排队中的请求失效
    pub fn is_overriding(&self) -> bool {
        matches!(
            self,
            Self::Load { .. } | Self::Seek { .. } | Self::CancelAll { .. }
        )
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Load { generation, .. }
            | Self::Seek { generation, .. }
            | Self::FillBuffers { generation, .. }
            | Self::CancelAll { generation } => Some(*generation),
            Self::Shutdown => None,
        }
    }
}

/// 首个缓冲附带的信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillExtra {
    /// 该缓冲起点对应的音轨时间
    pub base_time: f64,
    pub track: TrackInfo,
    pub is_preload: bool,
    pub resume_after_load: bool,
}

/// 解码线程发回的响应
#[derive(Debug)]
pub enum WorkerResponse {
    BufferFilled {
        generation: u64,
        fill_type: FillType,
        buffer: DecodedPcmBuffer,
        extra: Option<FillExtra>,
    },
    /// 一次填充结束 (包括音轨已无数据的情况)
    Idle { generation: u64 },
    Error {
        generation: u64,
        message: String,
        /// 音轨级致命错误
        track_fatal: bool,
    },
}

impl WorkerResponse {
    pub fn generation(&self) -> u64 {
        match self {
            Self::BufferFilled { generation, .. }
            | Self::Idle { generation }
            | Self::Error { generation, .. } => *generation,
        }
    }
}

/// 调度器一侧的通道端点
pub struct WorkerLink {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    generation: Arc<AtomicU64>,
}

/// 解码线程一侧的通道端点
pub struct WorkerEndpoint {
    pub requests: Receiver<WorkerRequest>,
    pub responses: Sender<WorkerResponse>,
    generation: Arc<AtomicU64>,
}

impl WorkerEndpoint {
    /// 调度器当前的请求代号
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl WorkerLink {
    /// 创建一对相连的端点
    pub fn pair() -> (WorkerLink, WorkerEndpoint) {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(0));
        (
            WorkerLink {
                requests: request_tx,
                responses: response_rx,
                generation: Arc::clone(&generation),
            },
            WorkerEndpoint {
                requests: request_rx,
                responses: response_tx,
                generation,
            },
        )
    }

    /// 发送请求, 解码线程已退出时返回 false
    pub fn send(&self, request: WorkerRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub fn try_recv(&self) -> Option<WorkerResponse> {
        match self.responses.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerResponse> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 递增请求代号, 返回新代号
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// 解码线程句柄
pub struct DecodeWorker {
    handle: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    /// 启动解码线程
    pub fn spawn(config: PlaybackConfig) -> YinResult<(DecodeWorker, WorkerLink)> {
        let (link, endpoint) = WorkerLink::pair();
        let handle = thread::Builder::new()
            .name("yin-decode".into())
            .spawn(move || WorkerLoop::new(config, endpoint).run())?;
        Ok((
            DecodeWorker {
                handle: Some(handle),
            },
            link,
        ))
    }

    /// 等待线程退出 (需先发送 `Shutdown` 或丢弃 `WorkerLink`)
    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("解码线程异常退出");
        }
    }
}

/// 解码线程当前的音轨
struct ActiveTrack {
    decoder: TrackDecoder,
    is_preload: bool,
}

/// 解码线程主循环
pub struct WorkerLoop {
    config: PlaybackConfig,
    endpoint: WorkerEndpoint,
    queue: VecDeque<WorkerRequest>,
    track: Option<ActiveTrack>,
    spare: Vec<PlanarStorage>,
}

impl WorkerLoop {
    pub fn new(config: PlaybackConfig, endpoint: WorkerEndpoint) -> Self {
        Self {
            config,
            endpoint,
            queue: VecDeque::new(),
            track: None,
            spare: Vec::new(),
        }
    }

    /// 处理请求直到收到 `Shutdown` 或通道断开
    pub fn run(mut self) {
        debug!("解码线程启动");
        loop {
            if self.queue.is_empty() {
                match self.endpoint.requests.recv() {
                    Ok(request) => self.enqueue(request),
                    Err(_) => break,
                }
            }
            self.drain_incoming();
            let Some(request) = self.queue.pop_front() else {
                continue;
            };
            if !self.handle(request) {
                break;
            }
        }
        debug!("解码线程退出");
    }

    fn enqueue(&mut self, request: WorkerRequest) {
        if request.is_overriding() {
            for old in self.queue.drain(..) {
                if let WorkerRequest::FillBuffers { storage, .. } = old {
                    self.spare.extend(storage);
                }
            }
        }
        self.queue.push_back(request);
    }

    fn drain_incoming(&mut self) {
        while let Ok(request) = self.endpoint.requests.try_recv() {
            self.enqueue(request);
        }
    }

    /// 正在处理的 `generation` 是否已被取代
    fn is_superseded(&mut self, generation: u64) -> bool {
        self.drain_incoming();
        generation != self.endpoint.current_generation()
            || self.queue.front().is_some_and(WorkerRequest::is_overriding)
            || self
                .queue
                .iter()
                .any(|request| matches!(request, WorkerRequest::Shutdown))
    }

    fn send(&self, response: WorkerResponse) {
        self.endpoint.responses.send(response).ok();
    }

    /// 处理一个请求, 返回 false 表示退出
    fn handle(&mut self, request: WorkerRequest) -> bool {
        if let Some(generation) = request.generation() {
            let current = self.endpoint.current_generation();
            if generation < current {
                debug!("跳过过期请求 (代号 {generation}, 当前 {current})");
                if let WorkerRequest::FillBuffers { storage, .. } = request {
                    self.spare.extend(storage);
                }
                return true;
            }
        }

        match request {
            WorkerRequest::Load {
                generation,
                source,
                is_preload,
                buffer_fill_count,
                progress,
                resume_after_load,
            } => self.load(
                generation,
                source,
                is_preload,
                buffer_fill_count,
                progress,
                resume_after_load,
            ),
            WorkerRequest::Seek {
                generation,
                time,
                buffer_fill_count,
            } => self.seek(generation, time, buffer_fill_count),
            WorkerRequest::FillBuffers {
                generation,
                count,
                storage,
            } => {
                self.spare.extend(storage);
                self.fill(generation, count, FillType::Normal, None);
            }
            WorkerRequest::CancelAll { generation } => {
                debug!("取消全部请求 (代号 {generation})");
            }
            WorkerRequest::Shutdown => return false,
        }
        true
    }

    fn load(
        &mut self,
        generation: u64,
        source: TrackSource,
        is_preload: bool,
        buffer_fill_count: usize,
        progress: f64,
        resume_after_load: bool,
    ) {
        // 前台加载正在预加载的音轨时复用已打开的解码上下文
        let reuse = !is_preload
            && self
                .track
                .as_ref()
                .is_some_and(|t| t.is_preload && *t.decoder.source() == source);
        let fill_type = if reuse {
            FillType::Replacement
        } else if is_preload {
            FillType::Background
        } else {
            FillType::FirstLoad
        };

        if !reuse {
            self.track = None;
            match TrackDecoder::open(source, &self.config) {
                Ok(decoder) => {
                    info!(
                        "已加载 {}{}",
                        decoder.source(),
                        if is_preload { " (预加载)" } else { "" }
                    );
                    self.track = Some(ActiveTrack {
                        decoder,
                        is_preload,
                    });
                }
                Err(e) => {
                    warn!("加载失败: {e}");
                    self.send(WorkerResponse::Error {
                        generation,
                        track_fatal: e.is_track_fatal(),
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }

        let Some(active) = self.track.as_mut() else {
            return;
        };
        active.is_preload = is_preload;
        let info = *active.decoder.info();
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let base_time = if progress > 0.0 || reuse {
            match active.decoder.seek(progress * info.duration) {
                Ok(result) => result.time,
                Err(e) => {
                    self.fail(generation, e.to_string(), e.is_track_fatal());
                    return;
                }
            }
        } else {
            0.0
        };

        let extra = FillExtra {
            base_time,
            track: info,
            is_preload,
            resume_after_load,
        };
        self.fill(generation, buffer_fill_count.max(1), fill_type, Some(extra));
    }

    fn seek(&mut self, generation: u64, time: f64, buffer_fill_count: usize) {
        let Some(active) = self.track.as_mut() else {
            debug!("没有已加载的音轨, 忽略定位");
            self.send(WorkerResponse::Idle { generation });
            return;
        };
        let info = *active.decoder.info();
        let is_preload = active.is_preload;
        let base_time = match active.decoder.seek(time) {
            Ok(result) => result.time,
            Err(e) => {
                self.fail(generation, e.to_string(), e.is_track_fatal());
                return;
            }
        };
        let extra = FillExtra {
            base_time,
            track: info,
            is_preload,
            resume_after_load: false,
        };
        self.fill(
            generation,
            buffer_fill_count.max(1),
            FillType::FirstSeek,
            Some(extra),
        );
    }

    /// 解码至多 `count` 个缓冲并逐个发出, 最后发出 `Idle`
    fn fill(
        &mut self,
        generation: u64,
        count: usize,
        first: FillType,
        mut extra: Option<FillExtra>,
    ) {
        let Some(mut active) = self.track.take() else {
            self.send(WorkerResponse::Idle { generation });
            return;
        };

        let mut fill_type = first;
        for i in 0..count {
            if i > 0 && self.is_superseded(generation) {
                debug!("填充被取代 (代号 {generation}), 已完成 {i}/{count}");
                self.track = Some(active);
                return;
            }
            let storage = self.spare.pop().unwrap_or_default();
            match active.decoder.next_buffer(storage) {
                Ok(Some(buffer)) => {
                    let is_last = buffer.is_last_buffer;
                    self.send(WorkerResponse::BufferFilled {
                        generation,
                        fill_type,
                        buffer,
                        extra: extra.take(),
                    });
                    fill_type = FillType::Normal;
                    if is_last {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("{}: 解码失败: {e}", active.decoder.source());
                    self.fail(generation, e.to_string(), e.is_track_fatal());
                    return;
                }
            }
        }
        self.track = Some(active);
        self.send(WorkerResponse::Idle { generation });
    }

    /// 报告错误并关闭当前音轨
    fn fail(&mut self, generation: u64, message: String, track_fatal: bool) {
        self.track = None;
        self.send(WorkerResponse::Error {
            generation,
            message,
            track_fatal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::tests::{silent_stream, test_config};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn spawn() -> (DecodeWorker, WorkerLink) {
        DecodeWorker::spawn(test_config()).unwrap()
    }

    fn load(link: &WorkerLink, frames: usize, count: usize) -> u64 {
        let generation = link.bump_generation();
        assert!(link.send(WorkerRequest::Load {
            generation,
            source: TrackSource::memory("a.mp3", silent_stream(frames)),
            is_preload: false,
            buffer_fill_count: count,
            progress: 0.0,
            resume_after_load: false,
        }));
        generation
    }

    /// 收集响应直到 `Idle` 或错误
    fn collect(link: &WorkerLink) -> Vec<WorkerResponse> {
        let mut out = Vec::new();
        while let Some(response) = link.recv_timeout(TIMEOUT) {
            let done = !matches!(response, WorkerResponse::BufferFilled { .. });
            out.push(response);
            if done {
                break;
            }
        }
        out
    }

    fn shutdown(worker: DecodeWorker, link: WorkerLink) {
        link.send(WorkerRequest::Shutdown);
        worker.join();
    }

    #[test]
    fn test_加载后按数量填充() {
        let (worker, link) = spawn();
        let generation = load(&link, 200, 3);
        let responses = collect(&link);
        assert_eq!(responses.len(), 4);
        let mut expected_start = 0.0;
        for (i, r) in responses[..3].iter().enumerate() {
            let WorkerResponse::BufferFilled {
                generation: g,
                fill_type,
                buffer,
                extra,
            } = r
            else {
                panic!("期望缓冲, 实际为 {r:?}");
            };
            assert_eq!(*g, generation);
            assert_eq!(buffer.start_time, expected_start);
            expected_start = buffer.end_time;
            if i == 0 {
                assert_eq!(*fill_type, FillType::FirstLoad);
                let extra = extra.unwrap();
                assert_eq!(extra.base_time, 0.0);
                assert_eq!(extra.track.channels, 1);
            } else {
                assert_eq!(*fill_type, FillType::Normal);
                assert!(extra.is_none());
            }
        }
        assert!(matches!(responses[3], WorkerResponse::Idle { .. }));
        shutdown(worker, link);
    }

    #[test]
    fn test_继续填充直到最后一个缓冲() {
        let (worker, link) = spawn();
        let generation = load(&link, 60, 1);
        collect(&link);
        link.send(WorkerRequest::FillBuffers {
            generation,
            count: 10,
            storage: vec![vec![vec![0.0; 16]]],
        });
        let responses = collect(&link);
        let buffers: Vec<&DecodedPcmBuffer> = responses
            .iter()
            .filter_map(|r| match r {
                WorkerResponse::BufferFilled { buffer, .. } => Some(buffer),
                _ => None,
            })
            .collect();
        assert!(!buffers.is_empty());
        assert!(buffers.last().unwrap().is_last_buffer);
        assert_eq!(buffers.iter().filter(|b| b.is_last_buffer).count(), 1);
        assert!(matches!(responses.last(), Some(WorkerResponse::Idle { .. })));

        // 音轨结束后的填充只返回 Idle
        link.send(WorkerRequest::FillBuffers {
            generation,
            count: 2,
            storage: Vec::new(),
        });
        let responses = collect(&link);
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], WorkerResponse::Idle { .. }));
        shutdown(worker, link);
    }

    #[test]
    fn test_定位返回基准时间() {
        let (worker, link) = spawn();
        load(&link, 300, 1);
        collect(&link);
        let generation = link.bump_generation();
        link.send(WorkerRequest::Seek {
            generation,
            time: 3.0,
            buffer_fill_count: 2,
        });
        let responses = collect(&link);
        let WorkerResponse::BufferFilled {
            fill_type,
            buffer,
            extra,
            ..
        } = &responses[0]
        else {
            panic!("期望缓冲");
        };
        assert_eq!(*fill_type, FillType::FirstSeek);
        let base = extra.unwrap().base_time;
        assert!((base - 3.0).abs() < 0.05);
        assert!((buffer.start_time - base).abs() < 1e-6);
        shutdown(worker, link);
    }

    #[test]
    fn test_加载失败报告错误() {
        let (worker, link) = spawn();
        let generation = link.bump_generation();
        link.send(WorkerRequest::Load {
            generation,
            source: TrackSource::memory("noise.bin", vec![0x11u8; 4096]),
            is_preload: false,
            buffer_fill_count: 1,
            progress: 0.0,
            resume_after_load: false,
        });
        let responses = collect(&link);
        assert!(matches!(
            responses.as_slice(),
            [WorkerResponse::Error { .. }]
        ));
        shutdown(worker, link);
    }

    #[test]
    fn test_过期请求被跳过() {
        let (link, endpoint) = WorkerLink::pair();
        let stale = link.generation();
        link.bump_generation();
        link.send(WorkerRequest::FillBuffers {
            generation: stale,
            count: 1,
            storage: vec![vec![vec![0.0; 4]]],
        });
        link.send(WorkerRequest::Shutdown);
        let mut worker = WorkerLoop::new(test_config(), endpoint);
        worker.drain_incoming();
        let request = worker.queue.pop_front().unwrap();
        assert!(worker.handle(request));
        // 过期请求携带的存储留作备用
        assert_eq!(worker.spare.len(), 1);
        let request = worker.queue.pop_front().unwrap();
        assert!(!worker.handle(request));
        assert!(link.try_recv().is_none());
    }

    #[test]
    fn test_退出请求不清空队列但中断填充() {
        let (link, endpoint) = WorkerLink::pair();
        let mut worker = WorkerLoop::new(test_config(), endpoint);
        worker.enqueue(WorkerRequest::FillBuffers {
            generation: 0,
            count: 1,
            storage: Vec::new(),
        });
        worker.enqueue(WorkerRequest::Shutdown);
        assert_eq!(worker.queue.len(), 2);
        assert!(!WorkerRequest::Shutdown.is_overriding());
        assert!(worker.is_superseded(0));
        drop(link);
    }

    #[test]
    fn test_覆盖请求清空队列() {
        let (link, endpoint) = WorkerLink::pair();
        let mut worker = WorkerLoop::new(test_config(), endpoint);
        for _ in 0..3 {
            worker.enqueue(WorkerRequest::FillBuffers {
                generation: 0,
                count: 1,
                storage: vec![Vec::new()],
            });
        }
        worker.enqueue(WorkerRequest::CancelAll { generation: 1 });
        assert_eq!(worker.queue.len(), 1);
        assert_eq!(worker.spare.len(), 3);
        drop(link);
    }
}
