//! 视频放大器

use crate::core::magnify::{
    load_frame_sequence, save_frame_sequence, EulerianMagnifier, Frame, MagnificationOutput,
    MagnificationParams, MagnifyError, PipelineObserver, StageError, VideoMetadata,
};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 视频放大器 - 金字塔分解 + 时域带通 + 放大重建
///
/// ```ignore
/// let magnifier = VideoMagnifier::create(MagnificationParams::for_pulse())?;
/// let output = magnifier.process(frames, metadata)?;
/// ```
pub struct VideoMagnifier {
    magnifier: EulerianMagnifier,
}

impl VideoMagnifier {
    pub fn create(params: MagnificationParams) -> Result<Self, MagnifyError> {
        crate::init_logging();
        let magnifier = EulerianMagnifier::new(params)?;
        info!("🎬 VideoMagnifier: created");
        Ok(Self { magnifier })
    }

    /// 从 JSON 参数创建，缺省字段使用默认值
    pub fn from_json(json: &str) -> Result<Self, MagnifyError> {
        Self::create(MagnificationParams::from_json_str(json)?)
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.magnifier.set_observer(observer);
        self
    }

    pub fn params(&self) -> &MagnificationParams {
        self.magnifier.params()
    }

    /// 处理已解码的帧
    pub fn process(
        &self,
        frames: Vec<Frame>,
        metadata: VideoMetadata,
    ) -> Result<MagnificationOutput, StageError> {
        self.magnifier.run(frames, metadata)
    }

    /// 读取帧序列目录，处理后写到 `output_dir/<结果名>/`，返回该目录
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        fps: f64,
    ) -> Result<PathBuf, MagnifyError> {
        let params = self.params();
        let frames = load_frame_sequence(input_dir, params.max_frames)?;
        let (width, height) = (frames[0].width, frames[0].height);
        let metadata = VideoMetadata::new(fps, width, height, frames.len());

        let output = self.process(frames, metadata).map_err(|e| {
            error!("❌ Magnification failed: {}", e);
            e
        })?;

        let stem = params.output_file_stem();
        let target = output_dir.join(&stem);
        save_frame_sequence(&output.frames, &target, &stem)?;
        info!("✅ Eulerian magnification finished: {:?}", target);
        Ok(target)
    }
}

impl Drop for VideoMagnifier {
    fn drop(&mut self) {
        info!("🗑️ VideoMagnifier: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::magnify::{PipelineStage, StageEvent};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<PipelineStage>>,
    }

    impl PipelineObserver for StageRecorder {
        fn on_stage_completed(&self, event: &StageEvent) {
            self.stages.lock().unwrap().push(event.stage());
        }
    }

    #[test]
    fn test_create_rejects_invalid_params() {
        let params = MagnificationParams {
            levels: 1,
            ..Default::default()
        };
        assert!(VideoMagnifier::create(params).is_err());
        assert!(VideoMagnifier::from_json(r#"{"low_freq_hz": 2.0, "high_freq_hz": 1.0}"#).is_err());
    }

    #[test]
    fn test_process_directory() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for i in 0..6u32 {
            let v = (100 + i * 5) as u8;
            RgbImage::from_pixel(16, 12, Rgb([v, v, v]))
                .save(input.path().join(format!("f{:03}.png", i)))
                .unwrap();
        }

        let magnifier =
            VideoMagnifier::from_json(r#"{"levels": 2, "alpha": 5.0, "max_frames": 4, "threads": 1}"#).unwrap();
        let target = magnifier.process_directory(input.path(), output.path(), 30.0).unwrap();

        assert!(target.ends_with("evm_output_levels2_f0.83-1.00_amp5.0_frames4"));
        let written = std::fs::read_dir(&target).unwrap().count();
        assert_eq!(written, 4);
    }

    #[test]
    fn test_with_observer_receives_stage_events() {
        let recorder = Arc::new(StageRecorder::default());
        let magnifier = VideoMagnifier::from_json(r#"{"levels": 2, "alpha": 5.0, "threads": 1}"#)
            .unwrap()
            .with_observer(recorder.clone());

        let frames: Vec<Frame> = (0..6)
            .map(|i| Frame::filled(16, 12, 1, 0.4 + i as f32 * 0.01))
            .collect();
        let metadata = VideoMetadata::new(30.0, 16, 12, frames.len());
        let output = magnifier.process(frames, metadata).unwrap();

        assert_eq!(output.frames.len(), 6);
        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![
                PipelineStage::DecomposeAll,
                PipelineStage::FilterPerLevel,
                PipelineStage::AmplifyAndReconstructAll
            ]
        );
    }

    #[test]
    fn test_process_directory_empty_input() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let magnifier = VideoMagnifier::create(MagnificationParams::default()).unwrap();
        assert!(matches!(
            magnifier.process_directory(input.path(), output.path(), 30.0),
            Err(MagnifyError::EmptyInput(_))
        ));
    }
}
