// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/extract.rs - 视频抽帧与鸟类裁剪
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

use std::path::Path;

use image::imageops;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  config::ExtractConfig,
  detector::{Detection, Detector},
  input::{InputWrapper, VideoSource},
  interrupt::CancelSignal,
  output,
};

/// 一次抽取的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
  /// 读取的帧数
  pub frames_processed: u64,
  /// 送入检测器的帧数
  pub frames_sampled: u64,
  pub detections_seen: u64,
  pub crops_written: u64,
  /// 裁剪框限制到画面内后面积为零
  pub zero_area_skipped: u64,
  /// 目标文件已存在，未覆盖
  pub collisions_skipped: u64,
  pub interrupted: bool,
  pub total_frames: Option<u64>,
}

/// 裁剪文件名：`{prefix}_{frame:06}_{seq:04}_conf{confidence:.2}.jpg`
pub fn crop_filename(prefix: &str, frame_index: u64, sequence: u32, confidence: f32) -> String {
  format!(
    "{}_{:06}_{:04}_conf{:.2}.jpg",
    prefix, frame_index, sequence, confidence
  )
}

/// 将检测框截断为整数像素并限制在画面内，返回 `(x, y, width, height)`
///
/// 面积为零时返回 `None`。
pub fn clamp_bbox(bbox: [f32; 4], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
  let x1 = (bbox[0] as i64).max(0);
  let y1 = (bbox[1] as i64).max(0);
  let x2 = (bbox[2] as i64).min(width as i64);
  let y2 = (bbox[3] as i64).min(height as i64);

  if x2 <= x1 || y2 <= y1 {
    return None;
  }
  Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}

pub struct Extractor {
  config: ExtractConfig,
}

impl Extractor {
  pub fn new(config: ExtractConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config })
  }

  /// 目标类别且置信度不低于阈值
  pub fn accepts(&self, detection: &Detection) -> bool {
    detection.class_id == self.config.target_class
      && detection.confidence >= self.config.confidence_threshold
  }

  /// 打开 `location` 指向的视频后抽取
  ///
  /// 视频无法打开时在任何处理开始前返回 I/O 类错误。
  pub fn extract_location<D: Detector>(
    &self,
    location: &str,
    output_dir: &Path,
    detector: &D,
    cancel: &CancelSignal,
  ) -> Result<ExtractionReport> {
    let source = InputWrapper::open(location)?;
    self.extract(source, output_dir, detector, cancel)
  }

  /// 从帧来源中抽取鸟类裁剪图
  ///
  /// `source` 在返回前释放，无论是正常结束、出错还是被中断。
  /// 中断不是错误，返回截至中断时的统计。
  pub fn extract<S, D>(
    &self,
    mut source: S,
    output_dir: &Path,
    detector: &D,
    cancel: &CancelSignal,
  ) -> Result<ExtractionReport>
  where
    S: VideoSource,
    D: Detector,
  {
    std::fs::create_dir_all(output_dir)?;

    let mut report = ExtractionReport {
      total_frames: source.total_frames(),
      ..Default::default()
    };
    info!(
      "📹 视频: {} 帧, {} FPS",
      report
        .total_frames
        .map_or_else(|| "未知".to_string(), |n| n.to_string()),
      source
        .fps()
        .map_or_else(|| "未知".to_string(), |fps| format!("{:.1}", fps))
    );
    info!("🔍 每 {} 帧分析一次", self.config.sample_stride);

    let result = self.run_loop(&mut source, output_dir, detector, cancel, &mut report);
    drop(source);
    debug!("视频源已释放");
    result?;

    info!("✅ 提取完成! 输出目录: {}", output_dir.display());
    info!(
      "🐦 共提取 {} 只鸟 ({} 帧已读取, {} 帧已分析)",
      report.crops_written, report.frames_processed, report.frames_sampled
    );
    Ok(report)
  }

  fn run_loop<S, D>(
    &self,
    source: &mut S,
    output_dir: &Path,
    detector: &D,
    cancel: &CancelSignal,
    report: &mut ExtractionReport,
  ) -> Result<()>
  where
    S: VideoSource,
    D: Detector,
  {
    let mut sequence = 0u32;

    loop {
      if cancel.is_cancelled() {
        warn!("⚠️ 提取被用户中断");
        report.interrupted = true;
        break;
      }
      let Some(frame) = source.next() else {
        break;
      };
      let frame = frame?;
      let frame_index = report.frames_processed;
      report.frames_processed += 1;

      if frame_index % self.config.sample_stride == 0 {
        report.frames_sampled += 1;
        let detections = detector.detect(&frame).map_err(Error::detection)?;
        report.detections_seen += detections.len() as u64;

        for detection in detections.iter().filter(|d| self.accepts(d)) {
          let Some((x, y, width, height)) =
            clamp_bbox(detection.bbox, frame.width(), frame.height())
          else {
            debug!("帧 {}: 检测框 {:?} 在画面外，跳过", frame_index, detection.bbox);
            report.zero_area_skipped += 1;
            continue;
          };

          let filename = crop_filename(
            &self.config.crop_prefix,
            frame_index,
            sequence + 1,
            detection.confidence,
          );
          let path = output_dir.join(&filename);
          let crop = imageops::crop_imm(&frame.image, x, y, width, height).to_image();
          if !output::save_new_jpeg(&crop, &path)? {
            warn!("文件已存在，不覆盖: {}", path.display());
            report.collisions_skipped += 1;
            continue;
          }
          sequence += 1;
          report.crops_written += 1;
          info!(
            "✅ 提取第 {} 只鸟: 帧 {}, 置信度 {:.2}",
            sequence, frame_index, detection.confidence
          );
        }
      }

      if report.frames_processed % self.config.progress_interval == 0 {
        match report.total_frames {
          Some(total) if total > 0 => info!(
            "⏳ 进度: {:.1}% ({}/{} 帧)",
            report.frames_processed as f64 / total as f64 * 100.0,
            report.frames_processed,
            total
          ),
          _ => info!("⏳ 进度: {} 帧", report.frames_processed),
        }
      }
    }

    Ok(())
  }
}
