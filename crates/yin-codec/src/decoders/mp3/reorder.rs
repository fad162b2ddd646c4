//! MP3 短块重排序 (Reordering)
//!
//! Huffman 输出按 (频带, 窗口, 频率) 排列, IMDCT 需要按 (频率, 窗口) 交错.

use super::data::Granule;
use super::tables::BAND_SIZE_SHORT;

/// 短块频带内三个窗口交错排列
pub fn reorder_block(g: &mut Granule, sample_rate_index: usize) {
    if g.block_type != 2 {
        return;
    }
    let mut ptr = if !g.switch_point {
        0
    } else if sample_rate_index != 8 {
        36
    } else {
        48
    };

    let mut tmp = [0i32; 3 * 192];
    for i in g.short_start..13 {
        let len = usize::from(BAND_SIZE_SHORT[sample_rate_index * 13 + i]);
        let band = &mut g.sb_hybrid[ptr..ptr + len * 3];
        for j in 0..len {
            tmp[j * 3] = band[j];
            tmp[j * 3 + 1] = band[len + j];
            tmp[j * 3 + 2] = band[2 * len + j];
        }
        band.copy_from_slice(&tmp[..len * 3]);
        ptr += len * 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_长块不重排() {
        let mut g = Granule::default();
        for (i, v) in g.sb_hybrid.iter_mut().enumerate() {
            *v = i as i32;
        }
        reorder_block(&mut g, 0);
        assert_eq!(g.sb_hybrid[5], 5);
    }

    #[test]
    fn test_短块窗口交错() {
        let mut g = Granule {
            block_type: 2,
            short_start: 0,
            ..Default::default()
        };
        for (i, v) in g.sb_hybrid.iter_mut().enumerate() {
            *v = i as i32;
        }
        reorder_block(&mut g, 0);
        // 44100Hz 第一个短块频带宽 4: [0..4) [4..8) [8..12)
        assert_eq!(&g.sb_hybrid[..6], &[0, 4, 8, 1, 5, 9]);
        assert_eq!(&g.sb_hybrid[9..12], &[3, 7, 11]);
        assert_eq!(g.sb_hybrid[12], 12);
    }

    #[test]
    fn test_混合块从长块之后开始() {
        let mut g = Granule {
            block_type: 2,
            switch_point: true,
            short_start: 3,
            ..Default::default()
        };
        for (i, v) in g.sb_hybrid.iter_mut().enumerate() {
            *v = i as i32;
        }
        reorder_block(&mut g, 0);
        assert_eq!(&g.sb_hybrid[..36], &(0..36).collect::<Vec<_>>()[..]);
        assert_eq!(&g.sb_hybrid[36..39], &[36, 40, 44]);
    }
}
