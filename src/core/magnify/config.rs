use super::amplify::SkipPolicy;
use super::error::MagnifyError;
use serde::{Deserialize, Serialize};

/// 放大参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnificationParams {
    pub levels: usize,
    pub low_freq_hz: f64,
    pub high_freq_hz: f64,
    pub alpha: f32,
    /// 只处理前 N 帧
    pub max_frames: Option<usize>,
    /// 并行线程数，`None` 时使用全部 CPU
    pub threads: Option<usize>,
    pub skip: SkipPolicy,
}

impl Default for MagnificationParams {
    fn default() -> Self {
        Self {
            levels: 3,
            low_freq_hz: 0.83,
            high_freq_hz: 1.0,
            alpha: 50.0,
            max_frames: None,
            threads: None,
            skip: SkipPolicy::default(),
        }
    }
}

impl MagnificationParams {
    /// 脉搏（约 50-60 bpm）
    pub fn for_pulse() -> Self {
        Self::default()
    }

    /// 呼吸（约 12-30 次/分钟）
    pub fn for_breathing() -> Self {
        Self {
            levels: 4,
            low_freq_hz: 0.2,
            high_freq_hz: 0.5,
            alpha: 20.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), MagnifyError> {
        if self.levels < 2 {
            return Err(MagnifyError::InvalidParameters(format!(
                "levels must be >= 2, got {}",
                self.levels
            )));
        }
        if !(self.low_freq_hz.is_finite() && self.high_freq_hz.is_finite()) {
            return Err(MagnifyError::InvalidParameters(
                "frequency band must be finite".to_string(),
            ));
        }
        if self.low_freq_hz < 0.0 || self.low_freq_hz >= self.high_freq_hz {
            return Err(MagnifyError::InvalidParameters(format!(
                "band must satisfy 0 <= low < high, got [{}, {}]",
                self.low_freq_hz, self.high_freq_hz
            )));
        }
        if !self.alpha.is_finite() {
            return Err(MagnifyError::InvalidParameters(format!(
                "alpha must be finite, got {}",
                self.alpha
            )));
        }
        if self.max_frames == Some(0) {
            return Err(MagnifyError::InvalidParameters(
                "max_frames must be > 0".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(MagnifyError::InvalidParameters("threads must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn from_json_str(json: &str) -> Result<Self, MagnifyError> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| MagnifyError::InvalidParameters(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String, MagnifyError> {
        serde_json::to_string_pretty(self).map_err(|e| MagnifyError::UnexpectedFailure(e.to_string()))
    }

    /// 结果文件名（不含扩展名）
    pub fn output_file_stem(&self) -> String {
        let frame_limit = self
            .max_frames
            .map(|n| format!("_frames{}", n))
            .unwrap_or_default();
        format!(
            "evm_output_levels{}_f{:.2}-{:.2}_amp{:?}{}",
            self.levels, self.low_freq_hz, self.high_freq_hz, self.alpha, frame_limit
        )
    }
}
