//! I/O 抽象层.
//!
//! 为解封装器提供统一的只读数据源: 本地文件、内存缓冲区和 (可选的) HTTP 流.
//! 解封装器按绝对偏移请求字节区间, 由 [`BlockCache`] 做块级缓存.

use std::io::{self, Read, Seek};
use std::path::Path;

use yin_core::YinResult;

/// 数据源类别, 决定帧扫描的字节预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// 本地文件或内存
    #[default]
    Local,
    /// 网络流
    Network,
}

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的数据来源.
pub trait IoBackend: Send {
    /// 读取数据到缓冲区, 返回 0 表示流末尾
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位 (seek)
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持 seek
    fn is_seekable(&self) -> bool;
    /// 数据源类别
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// I/O 上下文
///
/// 封装底层后端, 提供带缓冲的顺序读取和按偏移的随机读取.
pub struct IoContext {
    /// 内部 I/O 实现
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
}

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// 打开本地文件 (只读)
    pub fn open_read(path: impl AsRef<Path>) -> YinResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    /// 以内存数据作为数据源
    pub fn from_memory(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data.into())))
    }

    /// 从 URL 打开 (只读, HTTP/HTTPS)
    ///
    /// 后台线程流式下载数据, 读取方按需等待.
    #[cfg(feature = "http")]
    pub fn open_url(url: &str) -> YinResult<Self> {
        log::info!("正在连接: {}", url);
        let backend = HttpBackend::open(url)?;
        Ok(Self::new(Box::new(backend)))
    }

    // ========================
    // 顺序读取
    // ========================

    /// 尽量读满 `buf`, 返回实际读取的字节数 (流末尾时可能不足)
    pub fn read_partial(&mut self, buf: &mut [u8]) -> YinResult<usize> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered == 0 {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    break;
                }
                continue;
            }
            let to_copy = buffered.min(buf.len() - total_read);
            buf[total_read..total_read + to_copy]
                .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
            self.buf_pos += to_copy;
            total_read += to_copy;
        }
        Ok(total_read)
    }

    // ========================
    // 随机读取
    // ========================

    /// 从绝对偏移读取, 返回实际读取的字节数
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> YinResult<usize> {
        if self.size().is_some_and(|size| offset >= size) {
            return Ok(0);
        }
        self.seek(io::SeekFrom::Start(offset))?;
        self.read_partial(buf)
    }

    // ========================
    // 定位
    // ========================

    /// 定位 (seek), 会清空读缓冲区
    pub fn seek(&mut self, pos: io::SeekFrom) -> YinResult<u64> {
        self.buf_pos = 0;
        self.buf_len = 0;
        Ok(self.inner.seek(pos)?)
    }

    /// 获取当前位置 (扣除缓冲区中尚未消耗的数据)
    pub fn position(&mut self) -> YinResult<u64> {
        let raw_pos = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw_pos - buffered)
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    /// 数据源类别
    pub fn source_kind(&self) -> SourceKind {
        self.inner.kind()
    }
}

/// 块级读取缓存
///
/// 按绝对偏移访问数据源, 请求区间不在当前块内时重新读取一整块.
pub struct BlockCache {
    /// 当前块的起始偏移
    start: u64,
    /// 当前块数据
    data: Vec<u8>,
    /// 每次读取的块大小
    block_size: usize,
    /// 已探明的流末尾偏移
    eof: Option<u64>,
}

/// 默认块大小 (16 KB)
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// 单次请求的上限, 超出部分被截断
pub const MAX_BLOCK_SPAN: usize = 4 * 1024 * 1024;

impl BlockCache {
    /// 创建指定块大小的缓存
    pub fn new(block_size: usize) -> Self {
        Self {
            start: 0,
            data: Vec::new(),
            block_size: block_size.max(16),
            eof: None,
        }
    }

    /// 读取 `[pos, pos + len)`, 到达流末尾时返回的切片可能更短
    pub fn bytes_at(&mut self, io: &mut IoContext, pos: u64, len: usize) -> YinResult<&[u8]> {
        let end = self.start + self.data.len() as u64;
        // 当前块已经读到流末尾时, 越过末尾的请求也由它满足
        let block_reaches_eof = self.eof == Some(end);
        let cached = pos >= self.start
            && (pos.saturating_add(len as u64) <= end || (block_reaches_eof && pos <= end));
        if !cached {
            if self.eof.is_some_and(|eof| pos >= eof) {
                return Ok(&[]);
            }
            let mut want = self.block_size.max(len).min(MAX_BLOCK_SPAN);
            if let Some(size) = io.size() {
                let remaining = usize::try_from(size.saturating_sub(pos)).unwrap_or(usize::MAX);
                want = want.min(remaining);
            }
            self.data.resize(want, 0);
            let n = io.read_at(pos, &mut self.data)?;
            self.data.truncate(n);
            self.start = pos;
            let read_end = pos + n as u64;
            if n < want || io.size() == Some(read_end) {
                self.eof = Some(read_end);
            }
        }
        let from = (pos - self.start) as usize;
        let to = from.saturating_add(len).min(self.data.len());
        Ok(&self.data[from.min(to)..to])
    }

    /// 读取大端 u32, 越过流末尾返回 None
    pub fn u32_be_at(&mut self, io: &mut IoContext, pos: u64) -> YinResult<Option<u32>> {
        let bytes = self.bytes_at(io, pos, 4)?;
        Ok(<[u8; 4]>::try_from(bytes).ok().map(u32::from_be_bytes))
    }

    /// 丢弃缓存内容
    pub fn invalidate(&mut self) {
        self.data.clear();
        self.start = 0;
        self.eof = None;
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

// ========================
// 文件后端
// ========================

/// 文件 I/O 后端
struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

// ========================
// 内存后端
// ========================

/// 内存 I/O 后端
pub struct MemoryBackend {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

// ========================
// HTTP 后端
// ========================

/// HTTP 流式下载共享缓冲区
#[cfg(feature = "http")]
struct HttpStreamBuffer {
    /// 已下载的数据
    data: Vec<u8>,
    /// 总大小 (来自 Content-Length)
    total_size: Option<u64>,
    /// 下载是否已结束
    finished: bool,
    /// 下载错误信息
    error: Option<String>,
    /// 连接是否已建立
    connected: bool,
    /// 是否请求中止下载
    aborted: bool,
}

#[cfg(feature = "http")]
type HttpShared = std::sync::Arc<(std::sync::Mutex<HttpStreamBuffer>, std::sync::Condvar)>;

#[cfg(feature = "http")]
fn poisoned<T>(_: T) -> io::Error {
    io::Error::other("HTTP 下载缓冲区锁已损坏")
}

/// HTTP 流式 I/O 后端
///
/// 后台线程下载, 读取越过已下载区域时阻塞等待.
#[cfg(feature = "http")]
struct HttpBackend {
    shared: HttpShared,
    pos: usize,
    total_size: Option<u64>,
}

#[cfg(feature = "http")]
impl HttpBackend {
    fn open(url: &str) -> io::Result<Self> {
        use std::sync::{Arc, Condvar, Mutex};

        let shared: HttpShared = Arc::new((
            Mutex::new(HttpStreamBuffer {
                data: Vec::new(),
                total_size: None,
                finished: false,
                error: None,
                connected: false,
                aborted: false,
            }),
            Condvar::new(),
        ));

        let worker_shared = Arc::clone(&shared);
        let url_owned = url.to_string();
        std::thread::Builder::new()
            .name("yin-http".into())
            .spawn(move || http_download_worker(&url_owned, &worker_shared))?;

        let (lock, cvar) = &*shared;
        let mut sb = lock.lock().map_err(poisoned)?;
        while !sb.connected && !sb.finished {
            sb = cvar.wait(sb).map_err(poisoned)?;
        }
        if let Some(ref err) = sb.error {
            return Err(io::Error::other(err.clone()));
        }
        let total_size = sb.total_size;
        drop(sb);

        Ok(Self {
            shared,
            pos: 0,
            total_size,
        })
    }
}

#[cfg(feature = "http")]
impl Drop for HttpBackend {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.shared;
        if let Ok(mut sb) = lock.lock() {
            sb.aborted = true;
            cvar.notify_all();
        }
    }
}

#[cfg(feature = "http")]
impl IoBackend for HttpBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (lock, cvar) = &*self.shared;
        let mut sb = lock.lock().map_err(poisoned)?;
        loop {
            if self.pos < sb.data.len() {
                let to_read = buf.len().min(sb.data.len() - self.pos);
                buf[..to_read].copy_from_slice(&sb.data[self.pos..self.pos + to_read]);
                self.pos += to_read;
                return Ok(to_read);
            }
            if sb.finished {
                if let Some(ref err) = sb.error {
                    return Err(io::Error::other(err.clone()));
                }
                return Ok(0);
            }
            sb = cvar.wait(sb).map_err(poisoned)?;
        }
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => {
                let size = self.total_size.ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        "HTTP: 文件大小未知, 无法从末尾 seek",
                    )
                })?;
                size as i64 + offset
            }
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        self.total_size
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Network
    }
}

/// HTTP 后台下载线程
#[cfg(feature = "http")]
fn http_download_worker(url: &str, shared: &HttpShared) {
    let (lock, cvar) = &**shared;

    let finish = |error: Option<String>| {
        if let Ok(mut sb) = lock.lock() {
            sb.error = error;
            sb.finished = true;
            sb.connected = true;
            cvar.notify_all();
        }
    };

    let mut response = match ureq::get(url).call() {
        Ok(resp) => resp,
        Err(e) => {
            finish(Some(format!("HTTP 请求失败: {}", e)));
            return;
        }
    };

    let content_length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Ok(mut sb) = lock.lock() {
        sb.total_size = content_length;
        sb.connected = true;
        if let Some(len) = content_length {
            sb.data.reserve((len as usize).min(64 * 1024 * 1024));
        }
        cvar.notify_all();
    }

    let mut reader = response.body_mut().as_reader();
    let mut chunk = [0u8; DEFAULT_BUFFER_SIZE];
    loop {
        if lock.lock().map_or(true, |sb| sb.aborted) {
            log::debug!("HTTP 下载被中止");
            return;
        }
        match reader.read(&mut chunk) {
            Ok(0) => {
                log::info!("HTTP 下载完成");
                finish(None);
                return;
            }
            Ok(n) => {
                if let Ok(mut sb) = lock.lock() {
                    sb.data.extend_from_slice(&chunk[..n]);
                    cvar.notify_all();
                }
            }
            Err(e) => {
                log::error!("HTTP 下载错误: {}", e);
                finish(Some(format!("网络读取错误: {}", e)));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(data: &[u8]) -> IoContext {
        IoContext::from_memory(data.to_vec())
    }

    #[test]
    fn test_顺序读取() {
        let mut io = ctx(&[0x12, 0x34, 0x56, 0x78, 0x9A, b'R', b'I', b'F', b'F']);
        let mut head = [0u8; 3];
        assert_eq!(io.read_partial(&mut head).unwrap(), 3);
        assert_eq!(head, [0x12, 0x34, 0x56]);
        assert_eq!(io.position().unwrap(), 3);
        let mut rest = [0u8; 8];
        assert_eq!(io.read_partial(&mut rest).unwrap(), 6);
        assert_eq!(&rest[2..6], b"RIFF");
        assert_eq!(io.read_partial(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_按偏移读取_末尾不足() {
        let mut io = ctx(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 4];
        assert_eq!(io.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(io.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(io.position().unwrap(), 5);
    }

    #[test]
    fn test_块缓存_跨块读取() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut io = ctx(&data);
        let mut cache = BlockCache::new(16);
        assert_eq!(cache.u32_be_at(&mut io, 0).unwrap(), Some(0x0001_0203));
        // 跨越第一块末尾, 触发重新读取
        assert_eq!(cache.bytes_at(&mut io, 14, 4).unwrap(), &[14, 15, 16, 17]);
        // 流末尾
        assert_eq!(cache.bytes_at(&mut io, 98, 4).unwrap(), &[98, 99]);
        assert_eq!(cache.u32_be_at(&mut io, 97).unwrap(), None);
        assert_eq!(cache.u32_be_at(&mut io, 200).unwrap(), None);
    }

    /// 记录底层读取次数的内存后端
    struct CountingBackend {
        inner: MemoryBackend,
        reads: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl IoBackend for CountingBackend {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.inner.read(buf)
        }
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
        fn position(&mut self) -> io::Result<u64> {
            self.inner.position()
        }
        fn size(&self) -> Option<u64> {
            self.inner.size()
        }
        fn is_seekable(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_块缓存_末尾短块只读一次() {
        let reads = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: MemoryBackend::from_data((0..40u8).collect()),
            reads: reads.clone(),
        };
        let mut io = IoContext::new(Box::new(backend));
        let mut cache = BlockCache::new(16);
        assert_eq!(cache.bytes_at(&mut io, 30, 4).unwrap(), &[30, 31, 32, 33]);
        let after_first = reads.load(std::sync::atomic::Ordering::Relaxed);
        for _ in 0..5 {
            assert_eq!(cache.bytes_at(&mut io, 36, 8).unwrap(), &[36, 37, 38, 39]);
            assert_eq!(cache.u32_be_at(&mut io, 38).unwrap(), None);
            assert!(cache.bytes_at(&mut io, 50, 4).unwrap().is_empty());
        }
        assert_eq!(reads.load(std::sync::atomic::Ordering::Relaxed), after_first);
    }

    #[test]
    fn test_块缓存_超长请求按数据源大小分配() {
        let mut io = ctx(&[7u8; 64]);
        let mut cache = BlockCache::new(16);
        let bytes = cache.bytes_at(&mut io, 10, 0xFFFF * 0xFFFF).unwrap();
        assert_eq!(bytes.len(), 54);
        assert!(cache.data.capacity() < MAX_BLOCK_SPAN);
    }

    #[test]
    fn test_内存后端类别() {
        let io = ctx(&[0; 8]);
        assert_eq!(io.source_kind(), SourceKind::Local);
        assert_eq!(io.size(), Some(8));
        assert!(io.is_seekable());
    }
}
