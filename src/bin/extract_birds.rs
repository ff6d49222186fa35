// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/bin/extract_birds.rs - 从视频中抽取鸟类裁剪图
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use vogel_trainer::{
  FromUrl,
  config::PipelineConfig,
  detector::RecordReplayDetector,
  extract::Extractor,
  interrupt::CancelSignal,
};

/// 从视频中抽取鸟类裁剪图
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入视频：文件、帧目录，或 `gst://file/...`、`frames://...` 地址
  #[arg(value_name = "VIDEO")]
  pub video: String,

  /// 裁剪图输出目录
  #[arg(short, long, value_name = "DIR")]
  pub output: PathBuf,

  /// 预先计算的检测结果目录（每帧一个 `{frame:06}.txt`），也可以是 `record://` 地址
  ///
  /// 必填：本程序不内置检测模型。
  #[arg(long, value_name = "DIR")]
  pub detections: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<f32>,

  /// 每隔多少帧分析一次
  #[arg(long, value_name = "FRAMES")]
  pub sample_rate: Option<u64>,

  /// 目标类别编号（COCO 中鸟为 14）
  #[arg(long, value_name = "CLASS")]
  pub target_class: Option<u32>,

  /// TOML 配置文件
  #[arg(long, value_name = "TOML")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => PipelineConfig::from_toml_file(path)?,
    None => PipelineConfig::default(),
  };
  if let Some(threshold) = args.threshold {
    config.extract.confidence_threshold = threshold;
  }
  if let Some(stride) = args.sample_rate {
    config.extract.sample_stride = stride;
  }
  if let Some(class) = args.target_class {
    config.extract.target_class = class;
  }

  info!("输入视频: {}", args.video);
  info!("输出目录: {}", args.output.display());
  info!("检测结果: {}", args.detections);
  info!("置信度阈值: {}", config.extract.confidence_threshold);

  let detector = if args.detections.contains("://") {
    RecordReplayDetector::from_url(&Url::parse(&args.detections)?)?
  } else {
    RecordReplayDetector::open(&args.detections)?
  };
  let extractor = Extractor::new(config.extract)?;
  let cancel = CancelSignal::ctrlc()?;

  let report = extractor.extract_location(&args.video, &args.output, &detector, &cancel)?;

  info!("处理帧数: {}", report.frames_processed);
  info!("分析帧数: {}", report.frames_sampled);
  info!("保存鸟类图像: {}", report.crops_written);
  if report.zero_area_skipped + report.collisions_skipped > 0 {
    info!(
      "跳过: {} 个空检测框, {} 个已存在文件",
      report.zero_area_skipped, report.collisions_skipped
    );
  }
  if report.interrupted {
    info!("已被中断，保留已写入的图像");
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_output_flag_and_required_detections() {
    let args =
      Args::try_parse_from(["extract-birds", "amsel.mp4", "-o", "crops", "--detections", "rec"])
        .unwrap();
    assert_eq!(args.output, PathBuf::from("crops"));
    assert_eq!(args.detections, "rec");

    assert!(Args::try_parse_from(["extract-birds", "amsel.mp4", "-o", "crops"]).is_err());
  }
}
