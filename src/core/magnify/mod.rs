//! 欧拉视频放大 - 放大视频中肉眼不可见的周期性细微变化（脉搏、呼吸）
//!
//! 核心流程：
//! 1. 金字塔分解 - 每帧构建拉普拉斯金字塔
//! 2. 时域组装 - 同一层在所有帧上堆叠成时域体积
//! 3. 时域带通 - 逐层 FFT，只保留目标频段
//! 4. 放大重建 - 放大后加回原始层，逐帧重建

pub mod amplify;
pub mod bandpass;
pub mod config;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod pyramid;
pub mod sequence;
pub mod state_machine;
pub mod volume;

pub use amplify::{amplify, recombine, reconstruct_frame, LevelDecision, SkipPolicy};
pub use bandpass::{bandpass, bandpass_series, bin_frequency, TemporalBandpass};
pub use config::MagnificationParams;
pub use error::{MagnifyError, PipelineStage, StageError};
pub use frame::{Frame, VideoMetadata};
pub use pipeline::{
    EulerianMagnifier, MagnificationOutput, MagnificationRun, PipelineObserver, StageEvent,
};
pub use pyramid::{
    build_gaussian_pyramid, build_laplacian_pyramid, reconstruct_from_laplacian_pyramid, Pyramid,
};
pub use sequence::{load_frame_sequence, save_frame_sequence};
pub use state_machine::{PipelineEvent, PipelineState, StateMachine};
pub use volume::{assemble, Assembly, TemporalVolume, VolumeAssembler};
