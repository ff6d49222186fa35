// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/frame.rs - 视频帧与 NCHW 张量定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;

pub const RGB_CHANNELS: usize = 3;

/// 从视频源读取的一帧
#[derive(Debug, Clone)]
pub struct Frame {
  /// 帧序号，从 0 开始
  pub index: u64,
  pub timestamp_ms: u64,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, image: RgbImage) -> Self {
    Self {
      index,
      timestamp_ms: 0,
      image,
    }
  }

  pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
    self.timestamp_ms = timestamp_ms;
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 归一化后的单张图像，NCHW 排布（N = 1）
#[derive(Debug, Clone, PartialEq)]
pub struct NchwTensor {
  data: Box<[f32]>,
  height: usize,
  width: usize,
}

impl NchwTensor {
  pub fn with_shape(height: usize, width: usize) -> Self {
    Self {
      data: vec![0.0; RGB_CHANNELS * height * width].into_boxed_slice(),
      height,
      width,
    }
  }

  /// 像素缩放到 [0, 1] 后按通道做 `(x - mean) / std`
  pub fn normalized(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Self {
    let (width, height) = image.dimensions();
    let mut tensor = Self::with_shape(height as usize, width as usize);
    let plane = tensor.height * tensor.width;

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = y as usize * tensor.width + x as usize;
      for c in 0..RGB_CHANNELS {
        let value = pixel[c] as f32 / 255.0;
        tensor.data[c * plane + idx] = (value - mean[c]) / std[c];
      }
    }
    tensor
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for NchwTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
