//! MP3 侧边信息 (Side Information) 解析

use yin_core::{BitReader, YinError, YinResult};

use super::data::Granule;
use super::header::Mp3Header;
use super::tables::tables;

/// M/S 立体声标志位
pub const MODE_EXT_MS_STEREO: u32 = 2;
/// 强度立体声标志位
pub const MODE_EXT_I_STEREO: u32 = 1;

/// 帧级侧边信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideInfo {
    /// 主数据在位存储器中的回溯字节数
    pub main_data_begin: usize,
    pub private_bits: u32,
    /// 每声道 granule 数 (MPEG-1 为 2, LSF 为 1)
    pub nb_granules: usize,
}

impl SideInfo {
    /// 解析侧边信息, 结果写入 `granules[ch * 2 + gr]`
    pub fn parse(
        gb: &mut BitReader<'_>,
        header: &Mp3Header,
        granules: &mut [Granule; 4],
    ) -> YinResult<Self> {
        let nb_channels = header.nb_channels;
        let (main_data_begin, private_bits, nb_granules) = if header.lsf {
            let mdb = gb.get_bits(8);
            let private = gb.get_bits(nb_channels as u32);
            (mdb, private, 1)
        } else {
            let mdb = gb.get_bits(9);
            let private = gb.get_bits(if nb_channels == 2 { 3 } else { 5 });
            for ch in 0..nb_channels {
                granules[ch * 2].scfsi = 0;
                granules[ch * 2 + 1].scfsi = gb.get_bits(4);
            }
            (mdb, private, 2)
        };

        for gr in 0..nb_granules {
            for ch in 0..nb_channels {
                let g = &mut granules[ch * 2 + gr];
                read_gain_fields(g, gb, header)?;
                read_block_fields(g, gb, header)?;
                clamp_regions(g);
                read_band_limits(g, gb, header);
            }
        }

        Ok(Self {
            main_data_begin: main_data_begin as usize,
            private_bits,
            nb_granules,
        })
    }
}

/// part2_3_length, big_values, global_gain, scalefac_compress
fn read_gain_fields(g: &mut Granule, gb: &mut BitReader<'_>, header: &Mp3Header) -> YinResult<()> {
    g.part2_3_length = gb.get_bits(12);
    g.big_values = gb.get_bits(9);
    if g.big_values > 288 {
        return Err(YinError::InvalidData(format!(
            "big_values 超出范围: {}",
            g.big_values
        )));
    }
    g.global_gain = gb.get_bits(8) as i32;
    // 仅 M/S 立体声时增益补偿 sqrt(2)
    if header.mode_ext & (MODE_EXT_MS_STEREO | MODE_EXT_I_STEREO) == MODE_EXT_MS_STEREO {
        g.global_gain -= 2;
    }
    g.scalefac_compress = gb.get_bits(if header.lsf { 9 } else { 4 });
    Ok(())
}

/// 块类型, 码表选择与区域划分
fn read_block_fields(
    g: &mut Granule,
    gb: &mut BitReader<'_>,
    header: &Mp3Header,
) -> YinResult<()> {
    let sri = header.sample_rate_index;
    if gb.get_bits1() != 0 {
        g.block_type = gb.get_bits(2);
        if g.block_type == 0 {
            return Err(YinError::InvalidData("窗切换时块类型为 0".into()));
        }
        g.switch_point = gb.get_bits1() != 0;
        g.table_select[0] = gb.get_bits(5);
        g.table_select[1] = gb.get_bits(5);
        for gain in &mut g.subblock_gain {
            *gain = gb.get_bits(3) as i32;
        }
        g.region_size[0] = if g.block_type == 2 || sri <= 2 {
            18
        } else if sri != 8 {
            27
        } else {
            54
        };
        g.region_size[1] = 288;
    } else {
        g.block_type = 0;
        g.switch_point = false;
        for ts in &mut g.table_select {
            *ts = gb.get_bits(5);
        }
        let region_address1 = gb.get_bits(4) as usize;
        let region_address2 = gb.get_bits(3) as usize;
        let band_index = &tables().band_index_long[sri * 23..sri * 23 + 23];
        g.region_size[0] = usize::from(band_index[region_address1 + 1] >> 1);
        let l = (region_address1 + region_address2 + 2).min(22);
        g.region_size[1] = usize::from(band_index[l] >> 1);
    }
    Ok(())
}

/// 把区域终点按 big_values 截断, 转换成各区域长度 (以值对计)
fn clamp_regions(g: &mut Granule) {
    g.region_size[2] = 288;
    let big_values = g.big_values as usize;
    let mut start = 0;
    for size in &mut g.region_size {
        let end = (*size).min(big_values);
        *size = end - start;
        start = end;
    }
}

/// 长短块频带边界, preflag, scalefac_scale, count1 码表
fn read_band_limits(g: &mut Granule, gb: &mut BitReader<'_>, header: &Mp3Header) {
    let sri = header.sample_rate_index;
    if g.block_type == 2 {
        if g.switch_point {
            g.long_end = if sri <= 2 {
                8
            } else if sri != 8 {
                6
            } else {
                4
            };
            g.short_start = 2 + usize::from(sri != 8);
        } else {
            g.long_end = 0;
            g.short_start = 0;
        }
    } else {
        g.short_start = 13;
        g.long_end = 22;
    }

    g.preflag = if header.lsf { 0 } else { gb.get_bits1() };
    g.scalefac_scale = gb.get_bits1();
    g.count1table_select = gb.get_bits1();
}
