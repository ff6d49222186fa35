// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/input/image_sequence.rs - 图像序列输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{InputError, VideoSource},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_ascii_lowercase();
      IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

/// 将目录中的图片按文件名排序后视为连续视频帧
pub struct ImageSequenceInput {
  files: Vec<PathBuf>,
  cursor: usize,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::UnknownScheme(url.scheme().to_string()));
    }

    // frames://relative/dir 的 host 部分也是路径的一段
    let path = match url.host_str() {
      Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
      _ => url.path().to_string(),
    };
    Self::open(path)
  }
}

impl ImageSequenceInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, InputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    debug!("图像序列 {}: {} 帧", directory.display(), files.len());

    Ok(Self { files, cursor: 0 })
  }
}

impl Iterator for ImageSequenceInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.get(self.cursor)?;
    let index = self.cursor as u64;
    self.cursor += 1;

    let decoded = ImageReader::open(path)
      .map_err(InputError::from)
      .and_then(|reader| reader.decode().map_err(InputError::from));
    Some(decoded.map(|image| Frame::new(index, image.to_rgb8())))
  }
}

impl VideoSource for ImageSequenceInput {
  fn total_frames(&self) -> Option<u64> {
    Some(self.files.len() as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn frames_are_read_in_filename_order() {
    let dir = tempfile::tempdir().unwrap();
    for (name, value) in [("b.png", 20u8), ("a.png", 10u8), ("c.png", 30u8)] {
      RgbImage::from_pixel(4, 3, Rgb([value, 0, 0]))
        .save(dir.path().join(name))
        .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

    let input = ImageSequenceInput::open(dir.path()).unwrap();
    assert_eq!(input.total_frames(), Some(3));

    let frames: Vec<Frame> = input.map(Result::unwrap).collect();
    let reds: Vec<u8> = frames.iter().map(|f| f.image.get_pixel(0, 0)[0]).collect();
    assert_eq!(reds, vec![10, 20, 30]);
    assert_eq!(frames[2].index, 2);
    assert_eq!((frames[0].width(), frames[0].height()), (4, 3));
  }

  #[test]
  fn from_url_uses_path() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("frames://{}", dir.path().display())).unwrap();
    let input = ImageSequenceInput::from_url(&url).unwrap();
    assert_eq!(input.total_frames(), Some(0));
  }
}
