//! 容器格式注册表.
//!
//! 管理所有已注册的解封装器, 支持按格式标识查找和自动探测.

use std::collections::HashMap;

use log::debug;
use yin_core::{YinError, YinResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeResult};

/// 探测时读取的头部字节数
const PROBE_SIZE: usize = 16 * 1024;

/// 解封装器工厂函数类型
pub type DemuxerFactory = fn() -> YinResult<Box<dyn Demuxer>>;

/// 容器格式注册表
pub struct FormatRegistry {
    /// 解封装器工厂映射
    demuxers: HashMap<FormatId, DemuxerEntry>,
    /// 格式探测器列表
    probes: Vec<Box<dyn FormatProbe + Send>>,
}

/// 解封装器注册条目
struct DemuxerEntry {
    /// 格式名称
    name: String,
    /// 工厂函数
    factory: DemuxerFactory,
}

impl FormatRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            demuxers: HashMap::new(),
            probes: Vec::new(),
        }
    }

    /// 注册一个解封装器
    pub fn register_demuxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: DemuxerFactory,
    ) {
        self.demuxers.insert(
            format_id,
            DemuxerEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 注册一个格式探测器
    pub fn register_probe(&mut self, probe: Box<dyn FormatProbe + Send>) {
        self.probes.push(probe);
    }

    /// 创建指定格式的解封装器实例
    pub fn create_demuxer(&self, format_id: FormatId) -> YinResult<Box<dyn Demuxer>> {
        let entry = self.demuxers.get(&format_id).ok_or_else(|| {
            YinError::Unsupported(format!("未找到 {format_id} 的解封装器"))
        })?;
        (entry.factory)()
    }

    /// 探测数据的容器格式
    ///
    /// 遍历所有已注册的探测器, 返回置信度最高的结果.
    pub fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeResult> {
        let mut best: Option<ProbeResult> = None;
        for probe in &self.probes {
            if let Some(score) = probe.probe(data, filename) {
                let is_better = best.as_ref().is_none_or(|b| score > b.score);
                if is_better {
                    best = Some(ProbeResult {
                        format_id: probe.format_id(),
                        score,
                    });
                }
            }
        }
        best
    }

    /// 获取所有已注册的解封装器名称
    pub fn list_demuxers(&self) -> Vec<(FormatId, &str)> {
        self.demuxers
            .iter()
            .map(|(id, entry)| (*id, entry.name.as_str()))
            .collect()
    }

    /// 探测输入文件格式 (不打开解封装器)
    ///
    /// 读取文件头部数据, 自动探测格式, 然后 seek 回起始位置.
    /// 数据与扩展名都无法识别时返回 `YinError::Format`.
    pub fn probe_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> YinResult<ProbeResult> {
        let mut probe_buf = vec![0u8; PROBE_SIZE];
        let read = io.read_at(0, &mut probe_buf)?;
        probe_buf.truncate(read);

        let result = self.probe(&probe_buf, filename).ok_or_else(|| {
            YinError::Format("无法识别输入文件格式".to_string())
        })?;
        debug!("探测结果: {} (分数 {})", result.format_id, result.score);

        // seek 回起始位置, 供后续 demuxer 读取
        io.seek(std::io::SeekFrom::Start(0))?;

        Ok(result)
    }

    /// 根据文件自动探测格式并创建解封装器
    ///
    /// 自动探测格式, 创建对应的解封装器, 并调用 `open()` 解析头部.
    pub fn open_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> YinResult<Box<dyn Demuxer>> {
        let result = self.probe_input(io, filename)?;
        let mut demuxer = self.create_demuxer(result.format_id)?;
        demuxer.open(io)?;
        Ok(demuxer)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{SCORE_EXTENSION, SCORE_MAX};

    fn registry() -> FormatRegistry {
        let mut reg = FormatRegistry::new();
        crate::register_all(&mut reg);
        reg
    }

    fn mp3_stream(frames: usize) -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&0xFFFB_9000u32.to_be_bytes());
        frame.repeat(frames)
    }

    #[test]
    fn test_注册与列举() {
        let reg = registry();
        let mut names: Vec<&str> = reg.list_demuxers().into_iter().map(|(_, n)| n).collect();
        names.sort_unstable();
        assert_eq!(names, ["mp3", "wav-mp3"]);
        assert!(reg.create_demuxer(FormatId::Mp3).is_ok());
    }

    #[test]
    fn test_探测选择最高分() {
        let reg = registry();
        let data = mp3_stream(4);
        let result = reg.probe(&data, Some("clip.wav")).unwrap();
        assert_eq!(result.format_id, FormatId::Mp3);
        assert_eq!(result.score, SCORE_MAX - 5);

        let by_name = reg.probe(&[0u8; 32], Some("clip.mp3")).unwrap();
        assert_eq!(by_name.score, SCORE_EXTENSION);
        assert!(reg.probe(&[0u8; 32], Some("clip.txt")).is_none());
    }

    #[test]
    fn test_打开输入() {
        let reg = registry();
        let mut io = IoContext::from_memory(mp3_stream(300));
        let mut demuxer = reg.open_input(&mut io, None).unwrap();
        assert_eq!(demuxer.name(), "mp3");
        assert!(demuxer.duration().unwrap() > 3.0);
        assert_eq!(demuxer.read_packet(&mut io).unwrap().pos, 0);
    }

    #[test]
    fn test_无法识别() {
        let reg = registry();
        let mut io = IoContext::from_memory(vec![0x11u8; 4096]);
        assert!(matches!(
            reg.open_input(&mut io, Some("noise.bin")),
            Err(YinError::Format(_))
        ));
    }
}
