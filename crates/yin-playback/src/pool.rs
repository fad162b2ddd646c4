//! 解码缓冲的存储池.
//!
//! 存储按 (声道数, 采样率) 分组复用. 池只在调度器一侧访问:
//! 解码线程产出的存储随缓冲转移过来, 播放结束后归还到这里,
//! 再随下一次填充请求转移回解码线程.

use std::collections::HashMap;

use log::debug;
use yin_core::YinError;

/// 平面 f32 存储, 每声道一个 `Vec`
pub type PlanarStorage = Vec<Vec<f32>>;

/// 默认最多保留的键数量
pub const DEFAULT_KEY_CAPACITY: usize = 4;

/// 池的键: (声道数, 采样率)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub channels: usize,
    pub sample_rate: u32,
}

impl PoolKey {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }
}

/// 命中统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    /// 回退为新分配的次数
    pub misses: u64,
    /// 因键数量超出容量而整组丢弃的次数
    pub evictions: u64,
    /// 归还次数
    pub releases: u64,
}

#[derive(Debug, Default)]
struct PoolEntry {
    free: Vec<PlanarStorage>,
    last_used: u64,
}

/// 缓冲存储池
#[derive(Debug)]
pub struct BufferPool {
    entries: HashMap<PoolKey, PoolEntry>,
    /// 最多保留的键数量
    capacity: usize,
    /// 每个键最多保留的存储块
    blocks_per_key: usize,
    tick: u64,
    stats: PoolStats,
}

impl BufferPool {
    pub fn new(capacity: usize, blocks_per_key: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            blocks_per_key: blocks_per_key.max(1),
            tick: 0,
            stats: PoolStats::default(),
        }
    }

    /// 取出一块每声道 `frames` 帧的存储
    ///
    /// 池中没有可用存储时新分配 (记为一次缺失, 不是错误).
    /// 复用的存储内容未清零.
    pub fn acquire(&mut self, key: PoolKey, frames: usize) -> PlanarStorage {
        self.tick += 1;
        let tick = self.tick;
        let reused = self.entries.get_mut(&key).and_then(|entry| {
            entry.last_used = tick;
            entry.free.pop()
        });
        match reused {
            Some(mut storage) => {
                self.stats.hits += 1;
                shape(&mut storage, key.channels, frames);
                storage
            }
            None => {
                self.stats.misses += 1;
                debug!("{}, 新分配 {:?} x {} 帧", YinError::PoolExhaustion, key, frames);
                vec![vec![0.0; frames]; key.channels]
            }
        }
    }

    /// 归还存储
    pub fn release(&mut self, key: PoolKey, storage: PlanarStorage) {
        if storage.is_empty() {
            return;
        }
        self.tick += 1;
        self.stats.releases += 1;
        let tick = self.tick;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        let entry = self.entries.entry(key).or_default();
        entry.last_used = tick;
        if entry.free.len() < self.blocks_per_key {
            entry.free.push(storage);
        }
    }

    /// 某个键当前空闲的存储块数量
    pub fn available(&self, key: PoolKey) -> usize {
        self.entries.get(&key).map_or(0, |e| e.free.len())
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// 丢弃全部存储
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_least_recent(&mut self) {
        let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| *key)
        else {
            return;
        };
        self.entries.remove(&key);
        self.stats.evictions += 1;
        debug!("缓冲池: 淘汰最久未用的键 {:?}", key);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_CAPACITY, 16)
    }
}

/// 调整为 `channels` 声道, 每声道 `frames` 帧
pub(crate) fn shape(storage: &mut PlanarStorage, channels: usize, frames: usize) {
    storage.resize_with(channels, Vec::new);
    for plane in storage.iter_mut() {
        plane.resize(frames, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEREO: PoolKey = PoolKey {
        channels: 2,
        sample_rate: 44100,
    };

    #[test]
    fn test_缺失时新分配() {
        let mut pool = BufferPool::default();
        let storage = pool.acquire(STEREO, 128);
        assert_eq!(storage.len(), 2);
        assert!(storage.iter().all(|p| p.len() == 128));
        assert_eq!(pool.stats().misses, 1);
        assert_eq!(pool.stats().hits, 0);
    }

    #[test]
    fn test_归还后复用() {
        let mut pool = BufferPool::default();
        let mut storage = pool.acquire(STEREO, 64);
        storage[0][0] = 0.5;
        let ptr = storage[0].as_ptr();
        pool.release(STEREO, storage);
        assert_eq!(pool.available(STEREO), 1);

        let again = pool.acquire(STEREO, 32);
        assert_eq!(again[0].as_ptr(), ptr);
        assert_eq!(again[0].len(), 32);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.available(STEREO), 0);
    }

    #[test]
    fn test_按键隔离() {
        let mut pool = BufferPool::default();
        let storage = pool.acquire(STEREO, 16);
        pool.release(STEREO, storage);
        let mono = pool.acquire(PoolKey::new(1, 44100), 16);
        assert_eq!(mono.len(), 1);
        assert_eq!(pool.stats().misses, 2);
        assert_eq!(pool.available(STEREO), 1);
    }

    #[test]
    fn test_每键容量上限() {
        let mut pool = BufferPool::new(4, 2);
        for _ in 0..5 {
            pool.release(STEREO, vec![vec![0.0; 8]; 2]);
        }
        assert_eq!(pool.available(STEREO), 2);
        assert_eq!(pool.stats().releases, 5);
    }

    #[test]
    fn test_淘汰最久未用的键() {
        let mut pool = BufferPool::new(2, 4);
        let a = PoolKey::new(2, 44100);
        let b = PoolKey::new(2, 48000);
        let c = PoolKey::new(1, 22050);
        pool.release(a, vec![vec![0.0; 4]; 2]);
        pool.release(b, vec![vec![0.0; 4]; 2]);
        // 访问 a, 使 b 成为最久未用
        let s = pool.acquire(a, 4);
        pool.release(a, s);
        pool.release(c, vec![vec![0.0; 4]]);

        assert_eq!(pool.stats().evictions, 1);
        assert_eq!(pool.available(a), 1);
        assert_eq!(pool.available(b), 0);
        assert_eq!(pool.available(c), 1);
    }
}
