// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/dataset/transforms.rs - 图像增强与预处理
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

use image::{RgbImage, imageops, imageops::FilterType};
use rand::Rng;

use crate::{config::AugmentConfig, frame::NchwTensor};

/// 随机裁剪的最大尝试次数，之后退化为中心裁剪
const CROP_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
  RandomResizedCrop {
    size: u32,
    scale: (f32, f32),
    ratio: (f32, f32),
  },
  RandomHorizontalFlip {
    probability: f32,
  },
  ColorJitter {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
  },
  /// 短边缩放到给定长度，保持宽高比
  Resize {
    shorter: u32,
  },
  CenterCrop {
    size: u32,
  },
}

impl Transform {
  pub fn apply<R: Rng + ?Sized>(&self, image: RgbImage, rng: &mut R) -> RgbImage {
    match *self {
      Transform::RandomResizedCrop { size, scale, ratio } => {
        let (x, y, w, h) = random_crop_window(image.width(), image.height(), scale, ratio, rng);
        let crop = imageops::crop_imm(&image, x, y, w, h).to_image();
        imageops::resize(&crop, size, size, FilterType::Triangle)
      }
      Transform::RandomHorizontalFlip { probability } => {
        if probability > 0.0 && rng.gen_bool(f64::from(probability.min(1.0))) {
          imageops::flip_horizontal(&image)
        } else {
          image
        }
      }
      Transform::ColorJitter {
        brightness,
        contrast,
        saturation,
        hue,
      } => {
        let mut image = image;
        if let Some(factor) = jitter_factor(brightness, rng) {
          image = adjust_brightness(&image, factor);
        }
        if let Some(factor) = jitter_factor(contrast, rng) {
          image = adjust_contrast(&image, factor);
        }
        if let Some(factor) = jitter_factor(saturation, rng) {
          image = adjust_saturation(&image, factor);
        }
        if hue > 0.0 {
          let shift = rng.gen_range(-hue..=hue);
          let degrees = (shift * 360.0).round() as i32;
          if degrees != 0 {
            image = imageops::huerotate(&image, degrees);
          }
        }
        image
      }
      Transform::Resize { shorter } => {
        let (w, h) = (image.width(), image.height());
        let (nw, nh) = if w <= h {
          (shorter, (u64::from(shorter) * u64::from(h) / u64::from(w)) as u32)
        } else {
          ((u64::from(shorter) * u64::from(w) / u64::from(h)) as u32, shorter)
        };
        if (nw, nh) == (w, h) {
          image
        } else {
          imageops::resize(&image, nw.max(1), nh.max(1), FilterType::Triangle)
        }
      }
      Transform::CenterCrop { size } => {
        let (w, h) = (image.width(), image.height());
        let cw = size.min(w);
        let ch = size.min(h);
        let crop = imageops::crop_imm(&image, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image();
        // 原图比目标尺寸小时放大，保证输出尺寸固定
        if (cw, ch) == (size, size) {
          crop
        } else {
          imageops::resize(&crop, size, size, FilterType::Triangle)
        }
      }
    }
  }
}

fn random_crop_window<R: Rng + ?Sized>(
  width: u32,
  height: u32,
  scale: (f32, f32),
  ratio: (f32, f32),
  rng: &mut R,
) -> (u32, u32, u32, u32) {
  let area = width as f32 * height as f32;
  let log_ratio = (ratio.0.ln(), ratio.1.ln());

  for _ in 0..CROP_ATTEMPTS {
    let target_area = area * rng.gen_range(scale.0..=scale.1);
    let aspect = rng.gen_range(log_ratio.0..=log_ratio.1).exp();
    let w = (target_area * aspect).sqrt().round() as u32;
    let h = (target_area / aspect).sqrt().round() as u32;
    if w > 0 && h > 0 && w <= width && h <= height {
      let x = rng.gen_range(0..=width - w);
      let y = rng.gen_range(0..=height - h);
      return (x, y, w, h);
    }
  }

  let in_ratio = width as f32 / height as f32;
  let (w, h) = if in_ratio < ratio.0 {
    (width, ((width as f32 / ratio.0).round() as u32).clamp(1, height))
  } else if in_ratio > ratio.1 {
    (((height as f32 * ratio.1).round() as u32).clamp(1, width), height)
  } else {
    (width, height)
  };
  ((width - w) / 2, (height - h) / 2, w, h)
}

fn jitter_factor<R: Rng + ?Sized>(amount: f32, rng: &mut R) -> Option<f32> {
  if amount <= 0.0 {
    return None;
  }
  let low = (1.0 - amount).max(0.0);
  Some(rng.gen_range(low..=1.0 + amount))
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
  0.299 * r + 0.587 * g + 0.114 * b
}

fn blend(value: f32, toward: f32, factor: f32) -> u8 {
  (toward + (value - toward) * factor).round().clamp(0.0, 255.0) as u8
}

fn adjust_brightness(image: &RgbImage, factor: f32) -> RgbImage {
  let mut out = image.clone();
  for pixel in out.pixels_mut() {
    for c in pixel.0.iter_mut() {
      *c = blend(f32::from(*c), 0.0, factor);
    }
  }
  out
}

fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
  let count = (image.width() * image.height()).max(1) as f32;
  let mean = image
    .pixels()
    .map(|p| luma(f32::from(p[0]), f32::from(p[1]), f32::from(p[2])))
    .sum::<f32>()
    / count;
  let mut out = image.clone();
  for pixel in out.pixels_mut() {
    for c in pixel.0.iter_mut() {
      *c = blend(f32::from(*c), mean, factor);
    }
  }
  out
}

fn adjust_saturation(image: &RgbImage, factor: f32) -> RgbImage {
  let mut out = image.clone();
  for pixel in out.pixels_mut() {
    let gray = luma(
      f32::from(pixel[0]),
      f32::from(pixel[1]),
      f32::from(pixel[2]),
    );
    for c in pixel.0.iter_mut() {
      *c = blend(f32::from(*c), gray, factor);
    }
  }
  out
}

/// 一组按顺序执行的变换，最后按均值/方差归一化为张量
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
  steps: Vec<Transform>,
  mean: [f32; 3],
  std: [f32; 3],
}

impl Pipeline {
  /// 训练集：随机缩放裁剪、水平翻转、颜色抖动
  pub fn train(size: u32, augment: &AugmentConfig, mean: [f32; 3], std: [f32; 3]) -> Self {
    Self {
      steps: vec![
        Transform::RandomResizedCrop {
          size,
          scale: augment.crop_scale,
          ratio: augment.crop_ratio,
        },
        Transform::RandomHorizontalFlip {
          probability: augment.flip_probability,
        },
        Transform::ColorJitter {
          brightness: augment.brightness,
          contrast: augment.contrast,
          saturation: augment.saturation,
          hue: augment.hue,
        },
      ],
      mean,
      std,
    }
  }

  /// 验证集：短边缩放到 `size + margin` 后中心裁剪
  pub fn eval(size: u32, margin: u32, mean: [f32; 3], std: [f32; 3]) -> Self {
    Self {
      steps: vec![
        Transform::Resize {
          shorter: size + margin,
        },
        Transform::CenterCrop { size },
      ],
      mean,
      std,
    }
  }

  pub fn apply<R: Rng + ?Sized>(&self, image: RgbImage, rng: &mut R) -> NchwTensor {
    let image = self
      .steps
      .iter()
      .fold(image, |image, step| step.apply(image, rng));
    NchwTensor::normalized(&image, self.mean, self.std)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;
  use rand::{SeedableRng, rngs::StdRng};

  const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
  const STD: [f32; 3] = [0.5, 0.5, 0.5];

  fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
      Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })
  }

  #[test]
  fn train_pipeline_outputs_fixed_shape() {
    let pipeline = Pipeline::train(32, &AugmentConfig::default(), MEAN, STD);
    let mut rng = StdRng::seed_from_u64(3);
    for (w, h) in [(64, 48), (40, 90), (32, 32)] {
      let tensor = pipeline.apply(gradient(w, h), &mut rng);
      assert_eq!((tensor.channels(), tensor.height(), tensor.width()), (3, 32, 32));
    }
  }

  #[test]
  fn eval_pipeline_is_deterministic() {
    let pipeline = Pipeline::eval(24, 8, MEAN, STD);
    let a = pipeline.apply(gradient(80, 50), &mut StdRng::seed_from_u64(1));
    let b = pipeline.apply(gradient(80, 50), &mut StdRng::seed_from_u64(2));
    assert_eq!(a.as_nchw(), b.as_nchw());
    assert_eq!((a.height(), a.width()), (24, 24));
  }

  #[test]
  fn same_seed_same_augmentation() {
    let pipeline = Pipeline::train(16, &AugmentConfig::default(), MEAN, STD);
    let a = pipeline.apply(gradient(50, 40), &mut StdRng::seed_from_u64(11));
    let b = pipeline.apply(gradient(50, 40), &mut StdRng::seed_from_u64(11));
    assert_eq!(a.as_nchw(), b.as_nchw());
  }

  #[test]
  fn resize_keeps_aspect_on_shorter_side() {
    let mut rng = StdRng::seed_from_u64(0);
    let out = Transform::Resize { shorter: 40 }.apply(gradient(100, 50), &mut rng);
    assert_eq!((out.width(), out.height()), (80, 40));
    let out = Transform::Resize { shorter: 40 }.apply(gradient(20, 60), &mut rng);
    assert_eq!((out.width(), out.height()), (40, 120));
  }

  #[test]
  fn crop_window_stays_inside_image() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..200 {
      let (x, y, w, h) = random_crop_window(70, 30, (0.8, 1.0), (0.75, 4.0 / 3.0), &mut rng);
      assert!(w > 0 && h > 0);
      assert!(x + w <= 70 && y + h <= 30);
    }
  }

  #[test]
  fn zero_jitter_leaves_pixels_untouched() {
    let image = gradient(10, 10);
    let jitter = Transform::ColorJitter {
      brightness: 0.0,
      contrast: 0.0,
      saturation: 0.0,
      hue: 0.0,
    };
    let out = jitter.apply(image.clone(), &mut StdRng::seed_from_u64(0));
    assert_eq!(out, image);
  }
}
