// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/detector/record_replay.rs - 检测记录回放
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

//! 回放外部检测器按帧记录下来的结果。
//!
//! 每帧一个文本文件 `{frame:06}.txt`，每行一个目标：
//!
//! ```text
//! <class_id>, <score>, <x_min>, <y_min>, <x_max>, <y_max>
//! ```
//!
//! 坐标为相对图像宽高的归一化值，回放时换算为像素坐标。
//! 没有记录文件的帧视为无检测结果。

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::{Detection, Detector},
  frame::Frame,
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录格式错误 {path}:{line}: {reason}")]
  ParseError {
    path: PathBuf,
    line: usize,
    reason: String,
  },
}

pub struct RecordReplayDetector {
  directory: PathBuf,
}

impl FromUrlWithScheme for RecordReplayDetector {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordReplayDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(DetectorError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl RecordReplayDetector {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, DetectorError> {
    let directory = directory.as_ref();
    if !std::fs::metadata(directory)?.is_dir() {
      return Err(DetectorError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotADirectory,
        format!("{} 不是目录", directory.display()),
      )));
    }
    Ok(Self {
      directory: directory.to_path_buf(),
    })
  }

  pub fn record_path(&self, frame_index: u64) -> PathBuf {
    self.directory.join(format!("{:06}.txt", frame_index))
  }
}

fn parse_line(
  line: &str,
  width: f32,
  height: f32,
  path: &Path,
  line_no: usize,
) -> Result<Detection, DetectorError> {
  let parse_error = |reason: String| DetectorError::ParseError {
    path: path.to_path_buf(),
    line: line_no,
    reason,
  };

  let fields: Vec<&str> = line.split(',').map(str::trim).collect();
  if fields.len() != 6 {
    return Err(parse_error(format!("期望 6 个字段，实际 {} 个", fields.len())));
  }

  let class_id = fields[0]
    .parse::<u32>()
    .map_err(|e| parse_error(format!("类别编号 '{}': {}", fields[0], e)))?;
  let mut values = [0f32; 5];
  for (value, field) in values.iter_mut().zip(&fields[1..]) {
    *value = field
      .parse::<f32>()
      .map_err(|e| parse_error(format!("数值 '{}': {}", field, e)))?;
  }

  let [score, x_min, y_min, x_max, y_max] = values;
  Ok(Detection::new(
    class_id,
    score,
    [x_min * width, y_min * height, x_max * width, y_max * height],
  ))
}

impl Detector for RecordReplayDetector {
  type Error = DetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
    let path = self.record_path(frame.index);
    let text = match std::fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let (width, height) = (frame.width() as f32, frame.height() as f32);
    let detections = text
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty())
      .map(|(i, line)| parse_line(line, width, height, &path, i + 1))
      .collect::<Result<Vec<_>, _>>()?;

    debug!("帧 {}: 回放 {} 个检测结果", frame.index, detections.len());
    Ok(detections)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  fn frame(index: u64) -> Frame {
    Frame::new(index, RgbImage::new(200, 100))
  }

  #[test]
  fn replays_records_in_pixel_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("000005.txt"),
      "14, 0.8765, 0.1000, 0.2000, 0.5000, 0.9000\n0, 0.5, 0, 0, 1, 1\n",
    )
    .unwrap();

    let detector = RecordReplayDetector::open(dir.path()).unwrap();
    let detections = detector.detect(&frame(5)).unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].class_id, 14);
    assert!((detections[0].confidence - 0.8765).abs() < 1e-6);
    let expected = [20.0, 20.0, 100.0, 90.0];
    for (got, want) in detections[0].bbox.iter().zip(expected) {
      assert!((got - want).abs() < 1e-3, "{} != {}", got, want);
    }
  }

  #[test]
  fn missing_record_means_no_detections() {
    let dir = tempfile::tempdir().unwrap();
    let detector = RecordReplayDetector::open(dir.path()).unwrap();
    assert!(detector.detect(&frame(3)).unwrap().is_empty());
  }

  #[test]
  fn malformed_record_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("000000.txt"), "bird, 0.9, 0, 0, 1, 1").unwrap();
    let detector = RecordReplayDetector::open(dir.path()).unwrap();
    let err = detector.detect(&frame(0)).unwrap_err();
    assert!(matches!(err, DetectorError::ParseError { line: 1, .. }));
  }
}
