use super::error::MagnifyError;
use image::RgbImage;

/// 归一化浮点帧（HWC 交错存储，分量范围 [0, 1]，放大后可能越界）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl Frame {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, MagnifyError> {
        if data.len() != width * height * channels {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "frame buffer has {} values, expected {}x{}x{}",
                data.len(),
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, channels: usize, value: f32) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; width * height * channels],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[self.index(x, y, c)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, value: f32) {
        let idx = self.index(x, y, c);
        self.data[idx] = value;
    }

    /// 逐元素相加，生成新帧
    pub fn add(&self, other: &Frame) -> Result<Frame, MagnifyError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// 逐元素相减，生成新帧
    pub fn sub(&self, other: &Frame) -> Result<Frame, MagnifyError> {
        self.zip_with(other, |a, b| a - b)
    }

    fn zip_with(&self, other: &Frame, op: impl Fn(f32, f32) -> f32) -> Result<Frame, MagnifyError> {
        if !self.same_shape(other) {
            return Err(MagnifyError::UnexpectedFailure(format!(
                "shape mismatch: {}x{}x{} vs {}x{}x{}",
                self.width, self.height, self.channels, other.width, other.height, other.channels
            )));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(Frame {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
        })
    }

    /// 双线性缩放（像素中心对齐，边界钳位）
    ///
    /// 不对数值做截断，拉普拉斯层的负值会原样保留。
    pub fn resize_to(&self, target_width: usize, target_height: usize) -> Frame {
        if target_width == self.width && target_height == self.height {
            return self.clone();
        }

        let ch = self.channels;
        let xs = Self::linear_taps(self.width, target_width);
        let ys = Self::linear_taps(self.height, target_height);
        let mut data = vec![0.0f32; target_width * target_height * ch];

        for (ty, &(y0, y1, fy)) in ys.iter().enumerate() {
            for (tx, &(x0, x1, fx)) in xs.iter().enumerate() {
                let dst = (ty * target_width + tx) * ch;
                for c in 0..ch {
                    let top = self.at(x0, y0, c) * (1.0 - fx) + self.at(x1, y0, c) * fx;
                    let bot = self.at(x0, y1, c) * (1.0 - fx) + self.at(x1, y1, c) * fx;
                    data[dst + c] = top * (1.0 - fy) + bot * fy;
                }
            }
        }

        Frame {
            width: target_width,
            height: target_height,
            channels: ch,
            data,
        }
    }

    fn linear_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
        let scale = src_len as f32 / dst_len as f32;
        (0..dst_len)
            .map(|d| {
                let s = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
                let i0 = (s.floor() as usize).min(src_len - 1);
                let i1 = (i0 + 1).min(src_len - 1);
                (i0, i1, s - i0 as f32)
            })
            .collect()
    }

    /// 8 位 RGB 转归一化帧
    pub fn from_rgb_image(img: &RgbImage) -> Frame {
        let data = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Frame {
            width: img.width() as usize,
            height: img.height() as usize,
            channels: 3,
            data,
        }
    }

    /// 反归一化为 8 位 RGB，越界值截断到 [0, 255]
    pub fn to_rgb_image(&self) -> Result<RgbImage, MagnifyError> {
        let rgb: Vec<u8> = match self.channels {
            3 => self.data.iter().map(|&v| Self::to_u8(v)).collect(),
            1 => self
                .data
                .iter()
                .flat_map(|&v| {
                    let g = Self::to_u8(v);
                    [g, g, g]
                })
                .collect(),
            n => {
                return Err(MagnifyError::UnexpectedFailure(format!(
                    "cannot encode {}-channel frame as RGB",
                    n
                )))
            }
        };
        RgbImage::from_raw(self.width as u32, self.height as u32, rgb).ok_or_else(|| {
            MagnifyError::UnexpectedFailure("RGB buffer size mismatch".to_string())
        })
    }

    #[inline]
    fn to_u8(v: f32) -> u8 {
        (v * 255.0).clamp(0.0, 255.0) as u8
    }

    pub fn max_abs_diff(&self, other: &Frame) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

/// 视频元数据（加载后不可变，原样交给编码端）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub width: usize,
    pub height: usize,
    pub frame_count: usize,
}

impl VideoMetadata {
    pub fn new(fps: f64, width: usize, height: usize, frame_count: usize) -> Self {
        Self {
            fps,
            width,
            height,
            frame_count,
        }
    }

    pub fn with_frame_count(&self, frame_count: usize) -> Self {
        Self {
            frame_count,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: usize, height: usize) -> Frame {
        let mut frame = Frame::filled(width, height, 1, 0.0);
        for y in 0..height {
            for x in 0..width {
                frame.set(x, y, 0, (x + y) as f32 / (width + height) as f32);
            }
        }
        frame
    }

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(4, 2, 3, vec![0.5; 24]).unwrap();
        assert_eq!(frame.pixel_count(), 8);
        assert_eq!(frame.len(), 24);
        assert!(Frame::new(4, 2, 3, vec![0.5; 23]).is_err());
    }

    #[test]
    fn test_frame_resize() {
        let frame = gradient_frame(10, 7);
        let resized = frame.resize_to(20, 14);
        assert_eq!(resized.width, 20);
        assert_eq!(resized.height, 14);
        assert_eq!(resized.data.len(), 20 * 14);
    }

    #[test]
    fn test_resize_constant_is_constant() {
        let frame = Frame::filled(9, 5, 3, 0.25);
        let resized = frame.resize_to(4, 11);
        assert!(resized.data.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_resize_keeps_negative_values() {
        let frame = Frame::filled(3, 3, 1, -0.4);
        let resized = frame.resize_to(5, 5);
        assert!(resized.data.iter().all(|&v| (v + 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_add_and_sub() {
        let a = gradient_frame(6, 6);
        let b = Frame::filled(6, 6, 1, 0.1);
        let back = a.add(&b).unwrap().sub(&b).unwrap();
        assert!(back.max_abs_diff(&a) < 1e-6);
        assert!(a.add(&Frame::filled(5, 6, 1, 0.0)).is_err());
    }

    #[test]
    fn test_rgb_conversion_clips() {
        let mut frame = Frame::filled(2, 1, 3, 0.5);
        frame.set(0, 0, 0, 1.7);
        frame.set(1, 0, 2, -0.3);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[2], 0);
        assert_eq!(img.get_pixel(0, 0)[1], 127);

        let back = Frame::from_rgb_image(&img);
        assert_eq!(back.channels, 3);
        assert!((back.at(0, 0, 0) - 1.0).abs() < 1e-6);
    }
}
