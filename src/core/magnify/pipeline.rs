//! 欧拉视频放大流水线
//!
//! 分解 → 逐层时域带通 → 放大并重建，阶段之间严格串行：
//! 下一阶段开始前，上一阶段必须对全部帧产出完整结果。

use super::amplify::{amplify, reconstruct_frame, LevelDecision};
use super::bandpass::bandpass;
use super::config::MagnificationParams;
use super::error::{MagnifyError, PipelineStage, StageError};
use super::frame::{Frame, VideoMetadata};
use super::pyramid::build_laplacian_pyramid;
use super::state_machine::{PipelineEvent, PipelineState, StateMachine};
use super::volume::{Assembly, TemporalVolume, VolumeAssembler};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// 阶段完成事件
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Decomposed {
        frames: usize,
        levels: usize,
        mismatches_recovered: usize,
    },
    Filtered {
        decisions: Vec<LevelDecision>,
    },
    Reconstructed {
        frames: usize,
    },
}

impl StageEvent {
    pub fn stage(&self) -> PipelineStage {
        match self {
            StageEvent::Decomposed { .. } => PipelineStage::DecomposeAll,
            StageEvent::Filtered { .. } => PipelineStage::FilterPerLevel,
            StageEvent::Reconstructed { .. } => PipelineStage::AmplifyAndReconstructAll,
        }
    }
}

/// 阶段进度回调，由外部应用负责转到 UI 线程
pub trait PipelineObserver: Send + Sync {
    fn on_stage_completed(&self, event: &StageEvent);
}

/// 放大结果，交给外部编码器
#[derive(Debug, Clone)]
pub struct MagnificationOutput {
    pub frames: Vec<Frame>,
    pub metadata: VideoMetadata,
    pub mismatches_recovered: usize,
    pub level_decisions: Vec<LevelDecision>,
}

/// 单次运行，可逐阶段调用
pub struct MagnificationRun {
    params: MagnificationParams,
    machine: StateMachine,
    metadata: Option<VideoMetadata>,
    originals: Vec<TemporalVolume>,
    amplified: Vec<TemporalVolume>,
    decisions: Vec<LevelDecision>,
    mismatches_recovered: usize,
    output: Vec<Frame>,
}

impl MagnificationRun {
    pub fn new(params: MagnificationParams) -> Result<Self, MagnifyError> {
        params.validate()?;
        Ok(Self {
            params,
            machine: StateMachine::new(),
            metadata: None,
            originals: Vec::new(),
            amplified: Vec::new(),
            decisions: Vec::new(),
            mismatches_recovered: 0,
            output: Vec::new(),
        })
    }

    pub fn state(&self) -> &PipelineState {
        self.machine.current_state()
    }

    pub fn params(&self) -> &MagnificationParams {
        &self.params
    }

    /// 各层原始拉普拉斯体积
    pub fn originals(&self) -> &[TemporalVolume] {
        &self.originals
    }

    /// 各层放大后的信号，跳过的层全为 0
    pub fn amplified(&self) -> &[TemporalVolume] {
        &self.amplified
    }

    pub fn decisions(&self) -> &[LevelDecision] {
        &self.decisions
    }

    /// 阶段 1：逐帧构建拉普拉斯金字塔并组装时域体积
    pub fn decompose(
        &mut self,
        mut frames: Vec<Frame>,
        metadata: VideoMetadata,
    ) -> Result<StageEvent, StageError> {
        self.machine
            .fire(PipelineEvent::Start)
            .map_err(|e| StageError::new(PipelineStage::DecomposeAll, e))?;

        if let Some(limit) = self.params.max_frames {
            if frames.len() > limit {
                info!("✂️ Reached max_frames limit ({})", limit);
                frames.truncate(limit);
            }
        }

        let levels = self.params.levels;
        let result = decompose_all(&frames, levels, self.params.thread_count());
        drop(frames);

        let assembly = self.settle(PipelineStage::DecomposeAll, result)?;
        let frame_count = assembly.volumes[0].frames;
        self.metadata = Some(metadata.with_frame_count(frame_count));
        self.mismatches_recovered = assembly.mismatches_recovered;
        self.originals = assembly.volumes;

        info!(
            "🧱 Laplacian pyramids built for {} frames ({} levels, {} mismatches recovered)",
            frame_count, levels, self.mismatches_recovered
        );
        self.complete(PipelineStage::DecomposeAll)?;
        Ok(StageEvent::Decomposed {
            frames: frame_count,
            levels,
            mismatches_recovered: self.mismatches_recovered,
        })
    }

    /// 阶段 2：逐层带通并放大
    pub fn filter(&mut self) -> Result<StageEvent, StageError> {
        self.expect_state(PipelineState::FilterPerLevel, PipelineStage::FilterPerLevel)?;

        let fps = self.metadata.map(|m| m.fps).unwrap_or_default();
        let result = filter_per_level(&self.originals, fps, &self.params);
        let (amplified, decisions) = self.settle(PipelineStage::FilterPerLevel, result)?;

        for (level, decision) in decisions.iter().enumerate() {
            debug!("Level {}/{}: {:?}", level + 1, decisions.len(), decision);
        }
        info!(
            "🎚️ Filtered {}/{} levels ({:.2}-{:.2} Hz, alpha {})",
            decisions.iter().filter(|d| d.is_filtered()).count(),
            decisions.len(),
            self.params.low_freq_hz,
            self.params.high_freq_hz,
            self.params.alpha
        );

        self.amplified = amplified;
        self.decisions = decisions.clone();
        self.complete(PipelineStage::FilterPerLevel)?;
        Ok(StageEvent::Filtered { decisions })
    }

    /// 阶段 3：原始层 + 放大信号，逐帧重建
    pub fn reconstruct(&mut self) -> Result<StageEvent, StageError> {
        self.expect_state(
            PipelineState::AmplifyAndReconstructAll,
            PipelineStage::AmplifyAndReconstructAll,
        )?;

        let result = amplify_and_reconstruct_all(&self.originals, &self.amplified);
        let frames = self.settle(PipelineStage::AmplifyAndReconstructAll, result)?;

        // 体积不再需要
        self.originals = Vec::new();
        self.amplified = Vec::new();

        let count = frames.len();
        self.output = frames;
        info!("🎞️ Video reconstruction complete ({} frames)", count);
        self.complete(PipelineStage::AmplifyAndReconstructAll)?;
        Ok(StageEvent::Reconstructed { frames: count })
    }

    pub fn into_output(self) -> Result<MagnificationOutput, StageError> {
        let state = *self.machine.current_state();
        match (state, self.metadata) {
            (PipelineState::Done, Some(metadata)) => Ok(MagnificationOutput {
                frames: self.output,
                metadata,
                mismatches_recovered: self.mismatches_recovered,
                level_decisions: self.decisions,
            }),
            _ => Err(StageError::new(
                state.stage().unwrap_or(PipelineStage::AmplifyAndReconstructAll),
                MagnifyError::UnexpectedFailure(format!("run is not finished: {:?}", state)),
            )),
        }
    }

    fn expect_state(&self, expected: PipelineState, stage: PipelineStage) -> Result<(), StageError> {
        let state = *self.state();
        if state == expected {
            return Ok(());
        }
        Err(StageError::new(
            stage,
            MagnifyError::UnexpectedFailure(format!(
                "cannot run {} stage in state {:?}",
                stage, state
            )),
        ))
    }

    /// 失败时丢弃本次运行的全部中间结果
    fn settle<T>(&mut self, stage: PipelineStage, result: Result<T, MagnifyError>) -> Result<T, StageError> {
        result.map_err(|e| {
            error!("❌ {} stage failed: {}", stage, e);
            if let Err(transition) = self.machine.fire(PipelineEvent::StageFailed) {
                warn!("⚠️ Failure not recorded in state machine: {}", transition);
            }
            self.originals = Vec::new();
            self.amplified = Vec::new();
            self.output = Vec::new();
            StageError::new(stage, e)
        })
    }

    fn complete(&mut self, stage: PipelineStage) -> Result<(), StageError> {
        self.machine
            .fire(PipelineEvent::StageCompleted)
            .map(|_| ())
            .map_err(|e| StageError::new(stage, e))
    }
}

/// 逐帧分解并组装时域体积；帧按批并行构建金字塔，按输入顺序写入
pub fn decompose_all(
    frames: &[Frame],
    levels: usize,
    batch_size: usize,
) -> Result<Assembly, MagnifyError> {
    let first = frames
        .first()
        .ok_or_else(|| MagnifyError::EmptyInput("no frames decoded".to_string()))?;

    let reference = build_laplacian_pyramid(first, levels)?;
    let mut assembler = VolumeAssembler::new(&reference, frames.len())?;
    assembler.push(&reference)?;

    for batch in frames[1..].chunks(batch_size.max(1)) {
        let pyramids = batch
            .par_iter()
            .map(|frame| build_laplacian_pyramid(frame, levels))
            .collect::<Result<Vec<_>, _>>()?;
        for pyramid in &pyramids {
            assembler.push(pyramid)?;
        }
        debug!("Frame {}/{} pyramid built", assembler.frames_pushed(), frames.len());
    }

    assembler.finish()
}

/// 按跳过策略逐层带通并放大，返回每层的放大信号和处理决定
pub fn filter_per_level(
    volumes: &[TemporalVolume],
    fps: f64,
    params: &MagnificationParams,
) -> Result<(Vec<TemporalVolume>, Vec<LevelDecision>), MagnifyError> {
    let levels = volumes.len();
    volumes
        .par_iter()
        .enumerate()
        .map(|(level, volume)| -> Result<(TemporalVolume, LevelDecision), MagnifyError> {
            let decision = params.skip.decide(level, levels, volume);
            let signal = if decision.is_filtered() {
                let filtered = bandpass(volume, fps, params.low_freq_hz, params.high_freq_hz)?;
                amplify(&filtered, params.alpha)?
            } else {
                TemporalVolume::zeros_like(volume)?
            };
            Ok((signal, decision))
        })
        .collect::<Result<Vec<_>, MagnifyError>>()
        .map(|pairs| pairs.into_iter().unzip())
}

/// 按输入顺序逐帧重建
pub fn amplify_and_reconstruct_all(
    originals: &[TemporalVolume],
    amplified: &[TemporalVolume],
) -> Result<Vec<Frame>, MagnifyError> {
    let frames = originals
        .first()
        .map(|v| v.frames)
        .ok_or_else(|| MagnifyError::EmptyInput("no volumes to reconstruct".to_string()))?;

    (0..frames)
        .into_par_iter()
        .map(|t| reconstruct_frame(originals, amplified, t))
        .collect()
}

/// 一次性跑完整条流水线
pub struct EulerianMagnifier {
    params: MagnificationParams,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl EulerianMagnifier {
    pub fn new(params: MagnificationParams) -> Result<Self, MagnifyError> {
        params.validate()?;
        Ok(Self {
            params,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.set_observer(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn PipelineObserver>) {
        self.observer = Some(observer);
    }

    pub fn params(&self) -> &MagnificationParams {
        &self.params
    }

    pub fn run(
        &self,
        frames: Vec<Frame>,
        metadata: VideoMetadata,
    ) -> Result<MagnificationOutput, StageError> {
        let threads = self.params.thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                StageError::new(
                    PipelineStage::DecomposeAll,
                    MagnifyError::UnexpectedFailure(format!("thread pool: {}", e)),
                )
            })?;

        info!(
            "🚀 Processing {} frames ({}x{} @ {:.2} FPS) on {} threads",
            frames.len(),
            metadata.width,
            metadata.height,
            metadata.fps,
            threads
        );

        pool.install(|| {
            let mut run = MagnificationRun::new(self.params.clone())
                .map_err(|e| StageError::new(PipelineStage::DecomposeAll, e))?;

            let event = run.decompose(frames, metadata)?;
            self.notify(&event);
            let event = run.filter()?;
            self.notify(&event);
            let event = run.reconstruct()?;
            self.notify(&event);

            run.into_output()
        })
    }

    fn notify(&self, event: &StageEvent) {
        if let Some(observer) = &self.observer {
            observer.on_stage_completed(event);
        }
    }
}
