// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/detector.rs - 目标检测接口
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

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

mod record_replay;
pub use self::record_replay::{DetectorError, RecordReplayDetector};

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_id: u32,
  /// 置信度，[0, 1]
  pub confidence: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

impl Detection {
  pub fn new(class_id: u32, confidence: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_id,
      confidence,
      bbox,
    }
  }
}

/// 检测器能力
///
/// 同一次运行中类别编号必须保持稳定。
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
    (**self).detect(frame)
  }
}
