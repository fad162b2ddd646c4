//! 帧同步: 在数据源中定位可信的 Layer III 帧头.

use yin_codec::decoders::mp3::{Mp3Header, check_header};
use yin_core::YinResult;

use crate::io::{BlockCache, IoContext};

/// 解码 `pos` 处的 32 位字, 不是可解码的帧头时返回 None
pub(crate) fn header_at(
    cache: &mut BlockCache,
    io: &mut IoContext,
    pos: u64,
) -> YinResult<Option<Mp3Header>> {
    Ok(cache
        .u32_be_at(io, pos)?
        .filter(|&word| check_header(word))
        .and_then(Mp3Header::decode))
}

/// `pos` 处是否为经过前瞻确认的帧头
///
/// 下一帧位置必须同样是有效同步字; 帧恰好结束于 `data_end` 时视为最后一帧.
/// 越过 `data_end` 的截断帧不被接受.
pub(crate) fn confirmed_header(
    cache: &mut BlockCache,
    io: &mut IoContext,
    pos: u64,
    data_end: u64,
) -> YinResult<Option<Mp3Header>> {
    let Some(header) = header_at(cache, io, pos)? else {
        return Ok(None);
    };
    let next = pos + header.frame_size as u64;
    if next > data_end {
        return Ok(None);
    }
    if next + 4 > data_end {
        return Ok(Some(header));
    }
    let follows = cache
        .u32_be_at(io, next)?
        .is_some_and(check_header);
    Ok(follows.then_some(header))
}
