// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/input.rs - 视频输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod image_sequence;
pub use self::image_sequence::{ImageSequenceInput, is_image_file};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

/// 顺序帧来源
///
/// 资源在 `Drop` 时释放，调用方提前退出循环也不会泄漏。
pub trait VideoSource: Iterator<Item = Result<Frame, InputError>> {
  /// 总帧数，未知时返回 `None`
  fn total_frames(&self) -> Option<u64>;

  fn fps(&self) -> Option<f64> {
    None
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamer(#[from] GStreamerInputError),
  #[error("不支持的地址方案: {0}")]
  UnknownScheme(String),
  #[error("不支持的输入: {0}")]
  Unsupported(String),
}

impl InputError {
  pub fn is_io(&self) -> bool {
    match self {
      InputError::Io(_) | InputError::Decode(_) => true,
      #[cfg(feature = "gstreamer_input")]
      InputError::GStreamer(_) => true,
      _ => false,
    }
  }
}

pub enum InputWrapper {
  ImageSequence(ImageSequenceInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }

    if url.scheme() == ImageSequenceInput::SCHEME {
      let input = ImageSequenceInput::from_url(url)?;
      return Ok(InputWrapper::ImageSequence(input));
    }

    Err(InputError::UnknownScheme(url.scheme().to_string()))
  }
}

impl InputWrapper {
  /// 打开视频输入
  ///
  /// 既接受 `gst://file/...`、`frames://...` 形式的地址，也接受本地路径：
  /// 目录视为帧序列，文件交给 GStreamer 解码。
  pub fn open(location: &str) -> Result<Self, InputError> {
    if location.contains("://") {
      let url = Url::parse(location)
        .map_err(|e| InputError::Unsupported(format!("{}: {}", location, e)))?;
      return Self::from_url(&url);
    }

    let path = Path::new(location);
    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
      return Ok(InputWrapper::ImageSequence(ImageSequenceInput::open(path)?));
    }

    #[cfg(feature = "gstreamer_input")]
    {
      let input = GStreamerInputPipelineBuilder::file(path).build()?;
      Ok(InputWrapper::GStreamerInput(input))
    }
    #[cfg(not(feature = "gstreamer_input"))]
    {
      Err(InputError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("视频文件 {} 需要启用 gstreamer_input 特性", path.display()),
      )))
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageSequence(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

impl VideoSource for InputWrapper {
  fn total_frames(&self) -> Option<u64> {
    match self {
      InputWrapper::ImageSequence(input) => input.total_frames(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.total_frames(),
    }
  }

  fn fps(&self) -> Option<f64> {
    match self {
      InputWrapper::ImageSequence(input) => input.fps(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.fps(),
    }
  }
}
