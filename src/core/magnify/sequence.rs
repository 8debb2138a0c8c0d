//! 帧序列读写：目录中的 PNG/JPEG/BMP 按文件名排序作为视频帧

use super::error::MagnifyError;
use super::frame::Frame;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 列出目录中的帧文件（按文件名排序）
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>, MagnifyError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_frame_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// 读取帧序列并归一化到 [0, 1]，可限制最多读取的帧数
pub fn load_frame_sequence(dir: &Path, max_frames: Option<usize>) -> Result<Vec<Frame>, MagnifyError> {
    let files = list_frame_files(dir)?;
    let total = files.len();
    let take = max_frames.unwrap_or(total).min(total);

    let mut frames: Vec<Frame> = Vec::with_capacity(take);
    for path in files.iter().take(take) {
        let img = image::open(path)?.to_rgb8();
        let frame = Frame::from_rgb_image(&img);
        let frame = match frames.first() {
            Some(first) if !frame.same_shape(first) => {
                warn!(
                    "⚠️ {:?} is {}x{}, resizing to {}x{}",
                    path, frame.width, frame.height, first.width, first.height
                );
                frame.resize_to(first.width, first.height)
            }
            _ => frame,
        };
        frames.push(frame);
    }

    if frames.is_empty() {
        return Err(MagnifyError::EmptyInput(format!(
            "could not read any frames from {:?}",
            dir
        )));
    }

    info!("📖 Loaded {} frames out of {} from {:?}", frames.len(), total, dir);
    Ok(frames)
}

/// 截断到 [0, 255] 后写出 8 位 PNG 序列，返回写出的文件路径
pub fn save_frame_sequence(frames: &[Frame], dir: &Path, stem: &str) -> Result<Vec<PathBuf>, MagnifyError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("{}_{:05}.png", stem, i));
        frame.to_rgb_image()?.save(&path)?;
        written.push(path);
    }
    info!("💾 Saved {} frames to {:?}", written.len(), dir);
    Ok(written)
}
