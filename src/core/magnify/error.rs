use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MagnifyError {
    #[error("Invalid pyramid level count: {0} (need at least 1)")]
    InvalidLevelCount(usize),
    #[error("Image {width}x{height} is too small for {levels} pyramid levels")]
    DimensionTooSmall {
        width: usize,
        height: usize,
        levels: usize,
    },
    #[error("Temporal bandpass needs at least 2 frames, got {0}")]
    InsufficientFrames(usize),
    #[error("Empty input: {0}")]
    EmptyInput(String),
    #[error("Out of memory allocating {requested_bytes} bytes; reduce frames, levels or resolution")]
    MemoryExhausted { requested_bytes: usize },
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Unexpected failure: {0}")]
    UnexpectedFailure(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Stage(Box<StageError>),
}

/// 流水线阶段，用于错误和事件上报
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    DecomposeAll,
    FilterPerLevel,
    AmplifyAndReconstructAll,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::DecomposeAll => "decompose",
            PipelineStage::FilterPerLevel => "filter",
            PipelineStage::AmplifyAndReconstructAll => "reconstruct",
        };
        f.write_str(name)
    }
}

/// 带阶段名的流水线错误
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: PipelineStage,
    #[source]
    pub source: MagnifyError,
}

impl StageError {
    pub fn new(stage: PipelineStage, source: MagnifyError) -> Self {
        Self { stage, source }
    }
}

impl From<StageError> for MagnifyError {
    fn from(err: StageError) -> Self {
        MagnifyError::Stage(Box::new(err))
    }
}

/// 按字节数预留缓冲区，失败时报告 `MemoryExhausted` 而不是 abort
pub(crate) fn try_alloc_zeroed(len: usize) -> Result<Vec<f32>, MagnifyError> {
    let requested_bytes = len.saturating_mul(std::mem::size_of::<f32>());
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| MagnifyError::MemoryExhausted { requested_bytes })?;
    buf.resize(len, 0.0);
    Ok(buf)
}
