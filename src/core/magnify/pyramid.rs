//! 单帧多分辨率金字塔
//!
//! - 高斯金字塔：5 抽头可分离高斯核 [1,4,6,4,1]/16 模糊后 2× 抽取（尺寸向下取整）
//! - 拉普拉斯金字塔：每层减去上一层的上采样结果，最后一层保留最粗的高斯残差
//! - 上采样：补零插值 + 同一高斯核（×4 增益），再双线性对齐到目标尺寸
//!
//! 边界按 reflect-101 处理。各层按下标存放在连续的 `Vec<Frame>` 中。

use super::error::MagnifyError;
use super::frame::Frame;

const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// 金字塔：下标 0 为原分辨率，最后一层为最粗层
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    pub levels: Vec<Frame>,
}

impl Pyramid {
    pub fn new(levels: Vec<Frame>) -> Self {
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&Frame> {
        self.levels.get(index)
    }

    pub fn coarsest(&self) -> Option<&Frame> {
        self.levels.last()
    }

    /// 每层的 (width, height)
    pub fn shapes(&self) -> Vec<(usize, usize)> {
        self.levels.iter().map(|l| (l.width, l.height)).collect()
    }
}

pub fn build_gaussian_pyramid(frame: &Frame, levels: usize) -> Result<Pyramid, MagnifyError> {
    if levels < 1 {
        return Err(MagnifyError::InvalidLevelCount(levels));
    }

    let mut out = Vec::with_capacity(levels);
    out.push(frame.clone());
    for _ in 1..levels {
        let prev = &out[out.len() - 1];
        if prev.width / 2 < 1 || prev.height / 2 < 1 {
            return Err(MagnifyError::DimensionTooSmall {
                width: frame.width,
                height: frame.height,
                levels,
            });
        }
        let down = pyr_down(prev);
        out.push(down);
    }
    Ok(Pyramid::new(out))
}

pub fn build_laplacian_pyramid(frame: &Frame, levels: usize) -> Result<Pyramid, MagnifyError> {
    let gaussian = build_gaussian_pyramid(frame, levels)?;
    let mut g = gaussian.levels;

    let mut out = Vec::with_capacity(levels);
    for i in 0..levels - 1 {
        let finer = &g[i];
        let up = pyr_up(&g[i + 1], finer.width, finer.height);
        out.push(finer.sub(&up)?);
    }
    // 最粗层不做差分，保留基础亮度
    if let Some(residual) = g.pop() {
        out.push(residual);
    }
    Ok(Pyramid::new(out))
}

pub fn reconstruct_from_laplacian_pyramid(pyramid: &Pyramid) -> Result<Frame, MagnifyError> {
    let (coarsest, details) = pyramid
        .levels
        .split_last()
        .ok_or(MagnifyError::InvalidLevelCount(0))?;

    let mut acc = coarsest.clone();
    for detail in details.iter().rev() {
        let up = pyr_up(&acc, detail.width, detail.height);
        acc = up.add(detail)?;
    }
    Ok(acc)
}

/// 高斯模糊 + 2× 抽取
pub fn pyr_down(src: &Frame) -> Frame {
    let blurred = blur(src, 1.0);
    let (w, h, ch) = (src.width / 2, src.height / 2, src.channels);
    let mut data = Vec::with_capacity(w * h * ch);
    for y in 0..h {
        for x in 0..w {
            let base = blurred.index(x * 2, y * 2, 0);
            data.extend_from_slice(&blurred.data[base..base + ch]);
        }
    }
    Frame {
        width: w,
        height: h,
        channels: ch,
        data,
    }
}

/// 2× 上采样后对齐到 `dst_width`×`dst_height`
///
/// 奇数尺寸的上一层不是恰好两倍，所以对齐这一步不能省。
pub fn pyr_up(src: &Frame, dst_width: usize, dst_height: usize) -> Frame {
    let (w, h, ch) = (src.width * 2, src.height * 2, src.channels);
    let mut sparse = Frame::filled(w, h, ch, 0.0);
    for y in 0..src.height {
        for x in 0..src.width {
            let s = src.index(x, y, 0);
            let d = sparse.index(x * 2, y * 2, 0);
            sparse.data[d..d + ch].copy_from_slice(&src.data[s..s + ch]);
        }
    }
    // 补零后每个方向只有一半样本，增益 2×2
    let up = blur(&sparse, 4.0);
    up.resize_to(dst_width, dst_height)
}

fn blur(src: &Frame, gain: f32) -> Frame {
    let (w, h, ch) = (src.width, src.height, src.channels);
    let mut tmp = vec![0.0f32; src.data.len()];

    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let mut acc = 0.0;
                for (k, weight) in KERNEL.iter().enumerate() {
                    let sx = reflect101(x as isize + k as isize - 2, w);
                    acc += weight * src.data[(y * w + sx) * ch + c];
                }
                tmp[(y * w + x) * ch + c] = acc;
            }
        }
    }

    let mut data = vec![0.0f32; src.data.len()];
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let mut acc = 0.0;
                for (k, weight) in KERNEL.iter().enumerate() {
                    let sy = reflect101(y as isize + k as isize - 2, h);
                    acc += weight * tmp[(sy * w + x) * ch + c];
                }
                data[(y * w + x) * ch + c] = acc * gain;
            }
        }
    }

    Frame {
        width: w,
        height: h,
        channels: ch,
        data,
    }
}

#[inline]
fn reflect101(i: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_frame(width: usize, height: usize, channels: usize) -> Frame {
        let mut frame = Frame::filled(width, height, channels, 0.0);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let v = 0.5
                        + 0.3 * ((x as f32 * 0.7 + c as f32).sin())
                        + 0.2 * ((y as f32 * 0.45).cos());
                    frame.set(x, y, c, v.clamp(0.0, 1.0));
                }
            }
        }
        frame
    }

    #[test]
    fn test_gaussian_pyramid_shapes() {
        let frame = textured_frame(37, 21, 3);
        let pyramid = build_gaussian_pyramid(&frame, 4).unwrap();
        assert_eq!(pyramid.shapes(), vec![(37, 21), (18, 10), (9, 5), (4, 2)]);
        assert!(pyramid.levels.iter().all(|l| l.channels == 3));
        assert_eq!(pyramid.levels[0], frame);
    }

    #[test]
    fn test_invalid_level_count() {
        let frame = textured_frame(8, 8, 1);
        assert!(matches!(
            build_gaussian_pyramid(&frame, 0),
            Err(MagnifyError::InvalidLevelCount(0))
        ));
    }

    #[test]
    fn test_dimension_too_small() {
        let frame = textured_frame(8, 3, 1);
        // 3 -> 1 -> 0
        assert!(build_gaussian_pyramid(&frame, 2).is_ok());
        assert!(matches!(
            build_laplacian_pyramid(&frame, 3),
            Err(MagnifyError::DimensionTooSmall { levels: 3, .. })
        ));
    }

    #[test]
    fn test_single_level_laplacian_is_frame() {
        let frame = textured_frame(10, 10, 1);
        let pyramid = build_laplacian_pyramid(&frame, 1).unwrap();
        assert_eq!(pyramid.len(), 1);
        assert_eq!(pyramid.levels[0], frame);
    }

    #[test]
    fn test_laplacian_coarsest_is_gaussian_residual() {
        let frame = textured_frame(32, 24, 3);
        let gaussian = build_gaussian_pyramid(&frame, 3).unwrap();
        let laplacian = build_laplacian_pyramid(&frame, 3).unwrap();
        assert_eq!(laplacian.coarsest(), gaussian.coarsest());
        assert_eq!(laplacian.shapes(), gaussian.shapes());
    }

    #[test]
    fn test_round_trip_even_and_odd_sizes() {
        for &(w, h) in &[(32, 32), (33, 19), (45, 27)] {
            let frame = textured_frame(w, h, 3);
            let pyramid = build_laplacian_pyramid(&frame, 4).unwrap();
            let restored = reconstruct_from_laplacian_pyramid(&pyramid).unwrap();
            assert_eq!(restored.width, w);
            assert_eq!(restored.height, h);
            assert!(restored.max_abs_diff(&frame) < 1e-2);
        }
    }

    #[test]
    fn test_pyr_up_matches_target_size() {
        let frame = textured_frame(5, 3, 2);
        let up = pyr_up(&frame, 11, 7);
        assert_eq!((up.width, up.height, up.channels), (11, 7, 2));
    }

    #[test]
    fn test_constant_frame_has_zero_detail() {
        let frame = Frame::filled(16, 16, 1, 0.6);
        let pyramid = build_laplacian_pyramid(&frame, 3).unwrap();
        for detail in &pyramid.levels[..2] {
            assert!(detail.data.iter().all(|v| v.abs() < 1e-5));
        }
        let residual = pyramid.coarsest().unwrap();
        assert!(residual.data.iter().all(|v| (v - 0.6).abs() < 1e-5));
    }

    #[test]
    fn test_reconstruct_empty_pyramid_fails() {
        let empty = Pyramid::new(Vec::new());
        assert!(reconstruct_from_laplacian_pyramid(&empty).is_err());
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-2, 2), 0);
        assert_eq!(reflect101(3, 1), 0);
    }
}
