// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! 使用 `filesrc ! decodebin ! videoconvert` 逐帧解码视频文件，输出 RGB 帧。
//!
//! 地址格式为 `gst://file/path/to/video.mp4`。
//!
//! 抽帧不能丢帧，appsink 不启用 `drop`，也不与时钟同步。

use std::path::{Path, PathBuf};
use std::time::Duration;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{InputError, VideoSource},
};

/// 预滚动（获取时长与帧率）的最长等待时间
const PREROLL_TIMEOUT_SECS: u64 = 10;

const PULL_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// 超过该时间仍无新帧且未到流末尾，视为管道卡死
const PULL_STALL_TIMEOUT: Duration = Duration::from_secs(30);

const SINK_NAME: &str = "frames";

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// 期望 `gst://file/...`
  #[error("不是 gst://file 地址: {0}")]
  NotAFileUrl(String),
  #[error("视频文件不存在: {0}")]
  MissingFile(PathBuf),
  #[error("GStreamer 错误: {0}")]
  Glib(#[from] gst::glib::Error),
  #[error("GStreamer 调用失败: {0}")]
  GlibBool(#[from] gst::glib::BoolError),
  /// 文件无法解码时预滚动会失败
  #[error("管道状态切换失败: {0}")]
  StateChange(#[from] gst::StateChangeError),
  #[error("管道构建失败: {0}")]
  Pipeline(String),
  /// 解码中途失败
  #[error("视频流错误: {0}")]
  Stream(String),
  #[error("帧数据异常: {0}")]
  Sample(String),
  #[error("帧缓冲区过小: 需要 {expected} 字节，实际 {actual} 字节")]
  ShortBuffer { expected: usize, actual: usize },
}

/// 解码管道中的一段
enum Stage {
  Decode(PathBuf),
  Convert { format: &'static str },
}

impl Stage {
  fn describe(&self) -> String {
    match self {
      Stage::Decode(path) => format!("filesrc location=\"{}\" ! decodebin", path.display()),
      Stage::Convert { format } => format!("videoconvert ! video/x-raw,format={}", format),
    }
  }
}

pub struct GStreamerInputPipelineBuilder {
  source: PathBuf,
  stages: Vec<Stage>,
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::NotAFileUrl(url.to_string()));
    }
    Ok(Self::file(url.path()))
  }
}

impl GStreamerInputPipelineBuilder {
  pub fn file(path: impl AsRef<Path>) -> Self {
    let source = path.as_ref().to_path_buf();
    Self {
      stages: vec![Stage::Decode(source.clone()), Stage::Convert { format: "RGB" }],
      source,
    }
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    if !self.source.is_file() {
      return Err(GStreamerInputError::MissingFile(self.source));
    }

    gst::init()?;

    let stages: Vec<String> = self.stages.iter().map(Stage::describe).collect();
    let description = format!(
      "{} ! appsink name={} sync=false max-buffers=4 drop=false",
      stages.join(" ! "),
      SINK_NAME
    );
    info!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::Pipeline("顶层元素不是 Pipeline".to_string()))?;
    let appsink = pipeline
      .by_name(SINK_NAME)
      .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
      .ok_or_else(|| GStreamerInputError::Pipeline(format!("找不到 appsink '{}'", SINK_NAME)))?;

    // 从这里开始 input 持有管道，出错返回时由 Drop 负责停止
    let mut input = GStreamerInput {
      pipeline,
      appsink,
      frame_index: 0,
      total_frames: None,
      fps: None,
      failed: false,
    };

    // 先预滚动以便查询时长与帧率
    input.pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = input
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    result?;

    input.fps = input
      .appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps())
      .and_then(|caps| gst_video::VideoInfo::from_caps(&caps).ok())
      .map(|info| {
        let fps = info.fps();
        fps.numer() as f64 / fps.denom() as f64
      })
      .filter(|fps| fps.is_finite() && *fps > 0.0);

    let duration = input.pipeline.query_duration::<gst::ClockTime>();
    input.total_frames = duration
      .zip(input.fps)
      .map(|(duration, fps)| (duration.nseconds() as f64 / 1e9 * fps).round() as u64);
    debug!(
      "视频时长: {:?}, 帧率: {:?}, 估计帧数: {:?}",
      duration, input.fps, input.total_frames
    );

    input.pipeline.set_state(gst::State::Playing)?;

    Ok(input)
  }
}

/// GStreamer 视频输入
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  frame_index: u64,
  total_frames: Option<u64>,
  fps: Option<f64>,
  /// 出错后不再继续拉取
  failed: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止 GStreamer 管道: {}", e);
    } else {
      debug!("GStreamer 管道已释放");
    }
  }
}

impl GStreamerInput {
  /// 流结束时返回 `None`，解码出错或长时间无数据返回错误
  fn next_sample(&self) -> Option<Result<gst::Sample, GStreamerInputError>> {
    let mut waited = Duration::ZERO;
    loop {
      // 上游出错时流线程暂停，appsink 既不会出帧也不会 EOS
      if let Some(reason) = self.bus_error() {
        return Some(Err(GStreamerInputError::Stream(reason)));
      }
      if let Some(sample) = self.appsink.try_pull_sample(gst::ClockTime::from_mseconds(
        PULL_POLL_INTERVAL.as_millis() as u64,
      )) {
        return Some(Ok(sample));
      }
      if self.appsink.is_eos() {
        return None;
      }
      waited += PULL_POLL_INTERVAL;
      if waited >= PULL_STALL_TIMEOUT {
        return Some(Err(GStreamerInputError::Stream(format!(
          "{} 秒内没有收到新帧",
          PULL_STALL_TIMEOUT.as_secs()
        ))));
      }
    }
  }

  /// 取出管道总线上的错误消息
  fn bus_error(&self) -> Option<String> {
    let message = self
      .pipeline
      .bus()?
      .pop_filtered(&[gst::MessageType::Error])?;
    match message.view() {
      gst::MessageView::Error(err) => {
        debug!("GStreamer 错误详情: {:?}", err.debug());
        Some(err.error().to_string())
      }
      _ => None,
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }
    let sample = match self.next_sample()? {
      Ok(sample) => sample,
      Err(e) => {
        error!("读取视频帧失败: {}", e);
        self.failed = true;
        return Some(Err(e.into()));
      }
    };
    let index = self.frame_index;
    self.frame_index += 1;
    Some(sample_to_frame(&sample, index).map_err(InputError::from))
  }
}

impl VideoSource for GStreamerInput {
  fn total_frames(&self) -> Option<u64> {
    self.total_frames
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }
}

fn sample_to_frame(sample: &gst::Sample, index: u64) -> Result<Frame, GStreamerInputError> {
  let (Some(buffer), Some(caps)) = (sample.buffer(), sample.caps()) else {
    return Err(GStreamerInputError::Sample("缺少 buffer 或 caps".to_string()));
  };
  let video_info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|e| GStreamerInputError::Sample(format!("无法解析 caps: {}", e)))?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::Sample(format!(
      "期望 RGB 格式，实际为 {:?}",
      video_info.format()
    )));
  }

  let (width, height) = (video_info.width() as usize, video_info.height() as usize);
  let row_bytes = width * 3;
  let stride = video_info.stride()[0] as usize;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::Sample(format!("无法映射帧缓冲区: {}", e)))?;
  let bytes = map.as_slice();

  let needed = stride * height.saturating_sub(1) + row_bytes;
  if bytes.len() < needed {
    return Err(GStreamerInputError::ShortBuffer {
      expected: needed,
      actual: bytes.len(),
    });
  }

  // 去掉行尾对齐填充
  let pixels: Vec<u8> = (0..height)
    .flat_map(|row| &bytes[row * stride..row * stride + row_bytes])
    .copied()
    .collect();
  let image = RgbImage::from_raw(width as u32, height as u32, pixels)
    .ok_or_else(|| GStreamerInputError::Sample("无法创建 RGB 图像".to_string()))?;
  let timestamp_ms = buffer.pts().map(|pts| pts.mseconds()).unwrap_or(0);

  Ok(Frame::new(index, image).with_timestamp(timestamp_ms))
}
