use super::error::{MagnifyError, PipelineStage};

/// 流水线状态：严格顺序，不可恢复
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    DecomposeAll,
    FilterPerLevel,
    AmplifyAndReconstructAll,
    Done,
    Failed { stage: PipelineStage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    StageCompleted,
    StageFailed,
}

impl PipelineState {
    pub fn transition(&self, event: PipelineEvent) -> Result<PipelineState, MagnifyError> {
        use PipelineEvent::*;
        use PipelineState::*;

        let next = match (*self, event) {
            (Idle, Start) => DecomposeAll,
            (DecomposeAll, StageCompleted) => FilterPerLevel,
            (FilterPerLevel, StageCompleted) => AmplifyAndReconstructAll,
            (AmplifyAndReconstructAll, StageCompleted) => Done,
            (state, StageFailed) if !state.is_terminal() => Failed {
                // Idle 阶段的失败记在第一个阶段上
                stage: state.stage().unwrap_or(PipelineStage::DecomposeAll),
            },
            (state, event) => {
                return Err(MagnifyError::UnexpectedFailure(format!(
                    "invalid pipeline transition: {:?} on {:?}",
                    state, event
                )))
            }
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }

    /// 该状态对应的处理阶段
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineState::DecomposeAll => Some(PipelineStage::DecomposeAll),
            PipelineState::FilterPerLevel => Some(PipelineStage::FilterPerLevel),
            PipelineState::AmplifyAndReconstructAll => Some(PipelineStage::AmplifyAndReconstructAll),
            _ => None,
        }
    }
}

pub struct StateMachine {
    state: PipelineState,
    transition_count: u32,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            transition_count: 0,
        }
    }

    pub fn fire(&mut self, event: PipelineEvent) -> Result<PipelineState, MagnifyError> {
        let next = self.state.transition(event)?;
        self.state = next;
        self.transition_count += 1;
        Ok(next)
    }

    pub fn current_state(&self) -> &PipelineState {
        &self.state
    }

    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
