//! 时域体积：把同一金字塔层在所有帧上的数据按时间堆叠

use super::error::{try_alloc_zeroed, MagnifyError};
use super::frame::Frame;
use super::pyramid::Pyramid;
use log::{debug, warn};

/// 形状 (frames, height, width, channels) 的 f32 体积，按时间优先连续存放
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalVolume {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl TemporalVolume {
    pub fn zeros(
        frames: usize,
        height: usize,
        width: usize,
        channels: usize,
    ) -> Result<Self, MagnifyError> {
        let data = try_alloc_zeroed(frames * height * width * channels)?;
        Ok(Self {
            frames,
            height,
            width,
            channels,
            data,
        })
    }

    pub fn zeros_like(other: &TemporalVolume) -> Result<Self, MagnifyError> {
        Self::zeros(other.frames, other.height, other.width, other.channels)
    }

    /// 由有序帧序列直接构造
    pub fn from_frames(frames: &[Frame]) -> Result<Self, MagnifyError> {
        let first = frames
            .first()
            .ok_or_else(|| MagnifyError::EmptyInput("no frames for volume".to_string()))?;
        let mut volume = Self::zeros(frames.len(), first.height, first.width, first.channels)?;
        for (t, frame) in frames.iter().enumerate() {
            volume.set_frame(t, frame)?;
        }
        Ok(volume)
    }

    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.frames, self.height, self.width, self.channels)
    }

    /// 单帧元素个数（height × width × channels）
    pub fn frame_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn min_dimension(&self) -> usize {
        self.height.min(self.width)
    }

    pub fn frame_slice(&self, t: usize) -> &[f32] {
        let n = self.frame_len();
        &self.data[t * n..(t + 1) * n]
    }

    pub fn frame_slice_mut(&mut self, t: usize) -> &mut [f32] {
        let n = self.frame_len();
        &mut self.data[t * n..(t + 1) * n]
    }

    pub fn frame(&self, t: usize) -> Result<Frame, MagnifyError> {
        if t >= self.frames {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "frame index {} out of range ({} frames)",
                t, self.frames
            )));
        }
        Frame::new(self.width, self.height, self.channels, self.frame_slice(t).to_vec())
    }

    pub fn set_frame(&mut self, t: usize, frame: &Frame) -> Result<(), MagnifyError> {
        if t >= self.frames
            || frame.width != self.width
            || frame.height != self.height
            || frame.channels != self.channels
        {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "cannot place {}x{}x{} frame at slot {} of {}x{}x{}x{} volume",
                frame.width,
                frame.height,
                frame.channels,
                t,
                self.frames,
                self.height,
                self.width,
                self.channels
            )));
        }
        self.frame_slice_mut(t).copy_from_slice(&frame.data);
        Ok(())
    }

    /// (x, y, c) 位置上的时间序列
    pub fn series(&self, x: usize, y: usize, c: usize) -> Vec<f32> {
        let n = self.frame_len();
        let offset = (y * self.width + x) * self.channels + c;
        (0..self.frames).map(|t| self.data[t * n + offset]).collect()
    }

    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    /// 每层体积的字节数估算，调用方据此控制帧数/层数/分辨率
    pub fn estimated_bytes(frames: usize, shapes: &[(usize, usize)], channels: usize) -> usize {
        shapes
            .iter()
            .map(|&(w, h)| frames * w * h * channels * std::mem::size_of::<f32>())
            .sum()
    }
}

/// 组装结果
#[derive(Debug)]
pub struct Assembly {
    pub volumes: Vec<TemporalVolume>,
    /// 经缩放修正的层尺寸不一致次数
    pub mismatches_recovered: usize,
}

/// 逐帧接收拉普拉斯金字塔，写入对应的时域体积
///
/// 体积尺寸以第一帧的金字塔为准。
pub struct VolumeAssembler {
    volumes: Vec<TemporalVolume>,
    next_frame: usize,
    mismatches_recovered: usize,
}

impl VolumeAssembler {
    pub fn new(reference: &Pyramid, num_frames: usize) -> Result<Self, MagnifyError> {
        if reference.is_empty() {
            return Err(MagnifyError::InvalidLevelCount(0));
        }
        if num_frames == 0 {
            return Err(MagnifyError::EmptyInput("no frames to assemble".to_string()));
        }
        let shapes = reference.shapes();
        let channels = reference.levels[0].channels;
        debug!(
            "Allocating {} temporal volumes (~{} bytes)",
            shapes.len(),
            TemporalVolume::estimated_bytes(num_frames, &shapes, channels)
        );
        let volumes = reference
            .levels
            .iter()
            .map(|l| TemporalVolume::zeros(num_frames, l.height, l.width, l.channels))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            volumes,
            next_frame: 0,
            mismatches_recovered: 0,
        })
    }

    pub fn frames_pushed(&self) -> usize {
        self.next_frame
    }

    pub fn push(&mut self, pyramid: &Pyramid) -> Result<(), MagnifyError> {
        let t = self.next_frame;
        let capacity = self.volumes[0].frames;
        if t >= capacity {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "assembler already holds {} frames",
                capacity
            )));
        }
        if pyramid.len() != self.volumes.len() {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "frame {} has {} pyramid levels, expected {}",
                t,
                pyramid.len(),
                self.volumes.len()
            )));
        }

        for (k, (volume, level)) in self.volumes.iter_mut().zip(pyramid.levels.iter()).enumerate() {
            if level.channels != volume.channels {
                return Err(MagnifyError::UnexpectedFailure(format!(
                    "frame {} level {} has {} channels, expected {}",
                    t, k, level.channels, volume.channels
                )));
            }
            if level.width == volume.width && level.height == volume.height {
                volume.frame_slice_mut(t).copy_from_slice(&level.data);
            } else {
                warn!(
                    "⚠️ Shape mismatch at frame {}, level {}: {}x{} -> {}x{}",
                    t, k, level.width, level.height, volume.width, volume.height
                );
                let resized = level.resize_to(volume.width, volume.height);
                volume.frame_slice_mut(t).copy_from_slice(&resized.data);
                self.mismatches_recovered += 1;
            }
        }

        self.next_frame += 1;
        debug!("Frame {}/{} assembled", self.next_frame, capacity);
        Ok(())
    }

    pub fn finish(self) -> Result<Assembly, MagnifyError> {
        let expected = self.volumes[0].frames;
        if self.next_frame != expected {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "assembled {} of {} frames",
                self.next_frame, expected
            )));
        }
        Ok(Assembly {
            volumes: self.volumes,
            mismatches_recovered: self.mismatches_recovered,
        })
    }
}

/// 把所有帧的金字塔按层堆叠成时域体积
pub fn assemble(pyramids: &[Pyramid]) -> Result<Assembly, MagnifyError> {
    let reference = pyramids
        .first()
        .ok_or_else(|| MagnifyError::EmptyInput("no frame pyramids".to_string()))?;
    let mut assembler = VolumeAssembler::new(reference, pyramids.len())?;
    for pyramid in pyramids {
        assembler.push(pyramid)?;
    }
    assembler.finish()
}
