use super::error::MagnifyError;
use super::frame::Frame;
use super::pyramid::{reconstruct_from_laplacian_pyramid, Pyramid};
use super::volume::TemporalVolume;
use serde::{Deserialize, Serialize};

/// 跳过滤波的启发式阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipPolicy {
    /// 最粗层（纯低频残差）不做滤波
    pub exclude_coarsest: bool,
    /// 较短边 <= 该值的层不做滤波
    pub min_dimension: usize,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            exclude_coarsest: true,
            min_dimension: 4,
        }
    }
}

/// 单层的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelDecision {
    Filter,
    SkipCoarsest,
    SkipTooSmall,
}

impl LevelDecision {
    pub fn is_filtered(&self) -> bool {
        matches!(self, LevelDecision::Filter)
    }
}

impl SkipPolicy {
    pub fn decide(&self, level: usize, levels: usize, volume: &TemporalVolume) -> LevelDecision {
        if self.exclude_coarsest && level + 1 == levels {
            LevelDecision::SkipCoarsest
        } else if volume.min_dimension() <= self.min_dimension {
            LevelDecision::SkipTooSmall
        } else {
            LevelDecision::Filter
        }
    }
}

/// 逐元素乘以放大系数，生成新体积
pub fn amplify(filtered: &TemporalVolume, alpha: f32) -> Result<TemporalVolume, MagnifyError> {
    let mut out = TemporalVolume::zeros_like(filtered)?;
    for (o, &v) in out.data.iter_mut().zip(filtered.data.iter()) {
        *o = v * alpha;
    }
    Ok(out)
}

/// 第 `frame_index` 帧的各层：原始层 + 放大信号
pub fn recombine(
    originals: &[TemporalVolume],
    amplified: &[TemporalVolume],
    frame_index: usize,
) -> Result<Pyramid, MagnifyError> {
    if originals.len() != amplified.len() {
        return Err(MagnifyError::UnexpectedFailure(format!(
            "{} original levels but {} amplified levels",
            originals.len(),
            amplified.len()
        )));
    }

    let levels = originals
        .iter()
        .zip(amplified.iter())
        .map(|(orig, amp)| -> Result<Frame, MagnifyError> {
            if orig.shape() != amp.shape() {
                return Err(MagnifyError::UnexpectedFailure(format!(
                    "volume shape {:?} does not match amplified shape {:?}",
                    orig.shape(),
                    amp.shape()
                )));
            }
            orig.frame(frame_index)?.add(&amp.frame(frame_index)?)
        })
        .collect::<Result<Vec<Frame>, _>>()?;

    Ok(Pyramid::new(levels))
}

/// 重组金字塔并重建输出帧
pub fn reconstruct_frame(
    originals: &[TemporalVolume],
    amplified: &[TemporalVolume],
    frame_index: usize,
) -> Result<Frame, MagnifyError> {
    let pyramid = recombine(originals, amplified, frame_index)?;
    reconstruct_from_laplacian_pyramid(&pyramid)
}
