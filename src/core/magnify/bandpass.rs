//! 频域时间带通
//!
//! 对每个 (像素, 通道) 的时间序列独立做 DFT，按 |f| 保留 [low, high] 内的频点，
//! 逆变换后只取实部。正负频率按绝对值一起判定，实信号两侧必须对称保留。

use super::error::{try_alloc_zeroed, MagnifyError};
use super::volume::TemporalVolume;
use log::debug;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// 第 `j` 个频点的有符号频率（Hz），与 `fftfreq(n, 1/fps)` 一致
pub fn bin_frequency(j: usize, n: usize, fps: f64) -> f64 {
    let signed = if j < (n + 1) / 2 {
        j as f64
    } else {
        j as f64 - n as f64
    };
    signed * fps / n as f64
}

/// 为固定长度序列预先规划好的带通滤波器，可在所有序列间复用
pub struct TemporalBandpass {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    mask: Vec<bool>,
}

impl TemporalBandpass {
    pub fn new(len: usize, fps: f64, low_freq_hz: f64, high_freq_hz: f64) -> Result<Self, MagnifyError> {
        if len < 2 {
            return Err(MagnifyError::InsufficientFrames(len));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MagnifyError::InvalidParameters(format!("fps must be > 0, got {}", fps)));
        }
        if !(low_freq_hz.is_finite() && high_freq_hz.is_finite())
            || low_freq_hz < 0.0
            || low_freq_hz >= high_freq_hz
        {
            return Err(MagnifyError::InvalidParameters(format!(
                "band must satisfy 0 <= low < high, got [{}, {}]",
                low_freq_hz, high_freq_hz
            )));
        }

        let mask = (0..len)
            .map(|j| {
                let f = bin_frequency(j, len, fps).abs();
                f >= low_freq_hz && f <= high_freq_hz
            })
            .collect();

        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            mask,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// 通带内的频点数，为 0 时输出恒为 0
    pub fn passband_bins(&self) -> usize {
        self.mask.iter().filter(|&&keep| keep).count()
    }

    fn scratch_len(&self) -> usize {
        self.forward
            .get_inplace_scratch_len()
            .max(self.inverse.get_inplace_scratch_len())
    }

    fn work_buffers(&self) -> (Vec<Complex<f64>>, Vec<Complex<f64>>) {
        (
            vec![Complex::default(); self.len],
            vec![Complex::default(); self.scratch_len()],
        )
    }

    /// 原地滤波一条长度为 `len` 的序列
    pub fn apply_in_place(
        &self,
        series: &mut [f32],
        buffer: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) {
        for (b, &s) in buffer.iter_mut().zip(series.iter()) {
            *b = Complex::new(s as f64, 0.0);
        }
        self.forward.process_with_scratch(buffer, scratch);
        for (b, &keep) in buffer.iter_mut().zip(self.mask.iter()) {
            if !keep {
                *b = Complex::default();
            }
        }
        self.inverse.process_with_scratch(buffer, scratch);

        // rustfft 不做归一化；虚部是舍入残差，丢弃
        let norm = 1.0 / self.len as f64;
        for (s, b) in series.iter_mut().zip(buffer.iter()) {
            *s = (b.re * norm) as f32;
        }
    }

    pub fn filter_series(&self, series: &[f32]) -> Result<Vec<f32>, MagnifyError> {
        if series.len() != self.len {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "series length {} does not match planned length {}",
                series.len(),
                self.len
            )));
        }
        let mut out = series.to_vec();
        let (mut buffer, mut scratch) = self.work_buffers();
        self.apply_in_place(&mut out, &mut buffer, &mut scratch);
        Ok(out)
    }
}

/// 单条序列的带通，便于独立测试和并行
pub fn bandpass_series(
    series: &[f32],
    fps: f64,
    low_freq_hz: f64,
    high_freq_hz: f64,
) -> Result<Vec<f32>, MagnifyError> {
    TemporalBandpass::new(series.len(), fps, low_freq_hz, high_freq_hz)?.filter_series(series)
}

/// 沿时间轴对整个体积做带通，输出与输入同形
pub fn bandpass(
    volume: &TemporalVolume,
    fps: f64,
    low_freq_hz: f64,
    high_freq_hz: f64,
) -> Result<TemporalVolume, MagnifyError> {
    let filter = TemporalBandpass::new(volume.frames, fps, low_freq_hz, high_freq_hz)?;
    let mut out = TemporalVolume::zeros_like(volume)?;

    if filter.passband_bins() == 0 {
        debug!("Passband holds no DFT bins for {} frames, output is zero", volume.frames);
        return Ok(out);
    }

    let frames = volume.frames;
    let positions = volume.frame_len();

    // 转为按位置连续的布局，每条时间序列是一段连续内存
    let mut series_major = try_alloc_zeroed(frames * positions)?;
    for t in 0..frames {
        for (p, &v) in volume.frame_slice(t).iter().enumerate() {
            series_major[p * frames + t] = v;
        }
    }

    series_major
        .par_chunks_mut(frames)
        .for_each_init(|| filter.work_buffers(), |(buffer, scratch), series| {
            filter.apply_in_place(series, buffer, scratch);
        });

    for t in 0..frames {
        for (p, v) in out.frame_slice_mut(t).iter_mut().enumerate() {
            *v = series_major[p * frames + t];
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sinusoid(n: usize, fps: f64, freq: f64, amplitude: f64) -> Vec<f32> {
        (0..n)
            .map(|t| (amplitude * (2.0 * PI * freq * t as f64 / fps).sin()) as f32)
            .collect()
    }

    fn amplitude(series: &[f32]) -> f32 {
        series.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    fn volume_from_series(series: &[f32], height: usize, width: usize) -> TemporalVolume {
        let mut volume = TemporalVolume::zeros(series.len(), height, width, 1).unwrap();
        for (t, &v) in series.iter().enumerate() {
            volume.frame_slice_mut(t).iter_mut().for_each(|x| *x = v);
        }
        volume
    }

    #[test]
    fn test_bin_frequency_matches_fftfreq() {
        // n = 4, fps = 4: [0, 1, -2, -1]
        let freqs: Vec<f64> = (0..4).map(|j| bin_frequency(j, 4, 4.0)).collect();
        assert_eq!(freqs, vec![0.0, 1.0, -2.0, -1.0]);
        // n = 5, fps = 5: [0, 1, 2, -2, -1]
        let freqs: Vec<f64> = (0..5).map(|j| bin_frequency(j, 5, 5.0)).collect();
        assert_eq!(freqs, vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_mask_is_symmetric() {
        let filter = TemporalBandpass::new(60, 30.0, 0.8, 1.2).unwrap();
        let kept: Vec<usize> = (0..60).filter(|&j| filter.mask()[j]).collect();
        // 1 Hz 对应 bin 2 与 bin 58
        assert_eq!(kept, vec![2, 58]);
    }

    #[test]
    fn test_passband_preserved() {
        let input = sinusoid(60, 30.0, 1.0, 0.5);
        let output = bandpass_series(&input, 30.0, 0.8, 1.2).unwrap();
        assert!(amplitude(&output) >= 0.95 * amplitude(&input));
    }

    #[test]
    fn test_stopband_rejected() {
        let input = sinusoid(60, 30.0, 3.0, 0.5);
        let output = bandpass_series(&input, 30.0, 0.8, 1.2).unwrap();
        assert!(amplitude(&output) <= 0.05 * amplitude(&input));
    }

    #[test]
    fn test_dc_rejection() {
        let volume = volume_from_series(&[0.7; 24], 6, 5);
        let filtered = bandpass(&volume, 30.0, 0.5, 5.0).unwrap();
        assert!(filtered.max_abs() < 1e-5);
    }

    #[test]
    fn test_dc_kept_when_low_is_zero() {
        let output = bandpass_series(&[0.4; 16], 16.0, 0.0, 2.0).unwrap();
        assert!(output.iter().all(|v| (v - 0.4).abs() < 1e-5));
    }

    #[test]
    fn test_volume_shape_and_linearity() {
        let mut series = sinusoid(40, 20.0, 1.0, 0.3);
        for (t, v) in series.iter_mut().enumerate() {
            *v += 0.5 + 0.1 * (t as f32 * 1.7).sin();
        }
        let volume = volume_from_series(&series, 3, 4);
        let mut doubled = volume.clone();
        doubled.data.iter_mut().for_each(|v| *v *= 2.0);

        let a = bandpass(&volume, 20.0, 0.5, 1.5).unwrap();
        let b = bandpass(&doubled, 20.0, 0.5, 1.5).unwrap();
        assert_eq!(a.shape(), volume.shape());
        for (x, y) in a.data.iter().zip(b.data.iter()) {
            assert!((2.0 * x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_volume_matches_series_filter() {
        let mut volume = TemporalVolume::zeros(30, 2, 3, 2).unwrap();
        for t in 0..30 {
            for (p, v) in volume.frame_slice_mut(t).iter_mut().enumerate() {
                *v = ((t * (p + 1)) as f32 * 0.37).sin();
            }
        }
        let filtered = bandpass(&volume, 30.0, 1.0, 6.0).unwrap();
        let expected = bandpass_series(&volume.series(2, 1, 1), 30.0, 1.0, 6.0).unwrap();
        let actual = filtered.series(2, 1, 1);
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-6);
        }
    }

    #[test]
    fn test_insufficient_frames() {
        let volume = TemporalVolume::zeros(1, 4, 4, 1).unwrap();
        assert!(matches!(
            bandpass(&volume, 30.0, 0.5, 1.0),
            Err(MagnifyError::InsufficientFrames(1))
        ));
    }

    #[test]
    fn test_invalid_band() {
        assert!(matches!(
            bandpass_series(&[0.0; 8], 30.0, 2.0, 1.0),
            Err(MagnifyError::InvalidParameters(_))
        ));
        assert!(matches!(
            bandpass_series(&[0.0; 8], 0.0, 0.5, 1.0),
            Err(MagnifyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_empty_passband_gives_zero() {
        let volume = volume_from_series(&sinusoid(10, 30.0, 1.0, 0.5), 2, 2);
        // bin 间隔 3 Hz，[0.8, 1.2] 内没有频点
        let filtered = bandpass(&volume, 30.0, 0.8, 1.2).unwrap();
        assert_eq!(filtered.max_abs(), 0.0);
    }
}
