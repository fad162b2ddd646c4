//! MP3 解码数据结构
//!
//! 存储跨 granule 复用的中间状态 (侧边信息, 比例因子, 频谱, 重叠缓冲).

/// 子带数
pub const SBLIMIT: usize = 32;
/// 每个 granule 的频谱系数数
pub const GRANULE_SIZE: usize = SBLIMIT * 18;

/// Granule 解码状态
///
/// 每帧最多 2 声道 x 2 granule, 槽位在解码器生命周期内复用.
#[derive(Debug, Clone)]
pub struct Granule {
    pub scfsi: u32,
    pub part2_3_length: u32,
    pub big_values: u32,
    pub global_gain: i32,
    pub scalefac_compress: u32,
    pub block_type: u32,
    pub switch_point: bool,
    pub table_select: [u32; 3],
    pub subblock_gain: [i32; 3],
    pub scalefac_scale: u32,
    pub count1table_select: u32,
    pub region_size: [usize; 3],
    pub preflag: u32,
    /// 第一个短块频带
    pub short_start: usize,
    /// 最后一个长块频带 (不含)
    pub long_end: usize,
    pub scale_factors: [u8; 40],
    /// 频谱系数, 经 IMDCT 前的混合域样本
    pub sb_hybrid: [i32; GRANULE_SIZE],
}

impl Default for Granule {
    fn default() -> Self {
        Self {
            scfsi: 0,
            part2_3_length: 0,
            big_values: 0,
            global_gain: 0,
            scalefac_compress: 0,
            block_type: 0,
            switch_point: false,
            table_select: [0; 3],
            subblock_gain: [0; 3],
            scalefac_scale: 0,
            count1table_select: 0,
            region_size: [0; 3],
            preflag: 0,
            short_start: 0,
            long_end: 0,
            scale_factors: [0; 40],
            sb_hybrid: [0; GRANULE_SIZE],
        }
    }
}

/// 逐声道持久状态 (跨帧保持)
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// 子带样本, [36][SBLIMIT]
    pub sb_samples: [i32; 36 * SBLIMIT],
    /// IMDCT 重叠缓冲
    pub mdct_buf: [i32; GRANULE_SIZE],
    /// 合成滤波环形缓冲 (512 项, 镜像一份避免取模)
    pub synth_buf: [i16; 512 * 2],
    pub synth_buf_offset: usize,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            sb_samples: [0; 36 * SBLIMIT],
            mdct_buf: [0; GRANULE_SIZE],
            synth_buf: [0; 512 * 2],
            synth_buf_offset: 0,
        }
    }
}

impl ChannelState {
    /// 清空全部历史
    pub fn reset(&mut self) {
        self.sb_samples.fill(0);
        self.mdct_buf.fill(0);
        self.synth_buf.fill(0);
        self.synth_buf_offset = 0;
    }
}
