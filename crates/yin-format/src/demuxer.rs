//! 解封装器 (Demuxer) trait 定义.

use yin_codec::{CodecParameters, Packet};
use yin_core::YinResult;

use crate::demuxers::mp3::Mp3Metadata;
use crate::format_id::FormatId;
use crate::io::IoContext;

/// 解封装器 trait
///
/// 使用流程:
/// 1. 调用 `open()` 解析头部, 得到元数据
/// 2. 循环调用 `read_packet()` 读取数据包 (每包一个完整帧)
/// 3. 可选: 调用 `seek()` 定位, 之后继续读取
pub trait Demuxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 打开容器并解析头部信息
    fn open(&mut self, io: &mut IoContext) -> YinResult<()>;

    /// 解封装得到的元数据, `open()` 之前为 None
    fn metadata(&self) -> Option<&Mp3Metadata>;

    /// 解码器参数
    fn codec_parameters(&self) -> Option<CodecParameters>;

    /// 读取下一个数据包
    ///
    /// 到达数据区末尾返回 `YinError::Eof`.
    fn read_packet(&mut self, io: &mut IoContext) -> YinResult<Packet>;

    /// 定位到指定时间 (秒), 返回实际定位结果
    fn seek(&mut self, io: &mut IoContext, time: f64) -> YinResult<SeekResult>;

    /// 获取时长 (秒), None 表示未知
    fn duration(&self) -> Option<f64>;
}

/// 定位结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekResult {
    /// 定位后第一个输出样本对应的时间 (秒)
    pub time: f64,
    /// 开始读取的字节偏移
    pub offset: u64,
    /// 解码后需要丢弃的样本数 (每声道)
    pub samples_to_skip: u64,
    /// 开始解码的帧序号
    pub frame: u64,
}
