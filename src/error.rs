// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/error.rs - 错误定义
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

use thiserror::Error;

use crate::input::InputError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("输入源错误: {0}")]
  Input(#[from] InputError),
  #[error("配置错误: {0}")]
  Configuration(String),
  #[error("检测器错误: {0}")]
  Detection(#[source] BoxedError),
  #[error("分类器错误: {0}")]
  Classifier(#[source] BoxedError),
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("TOML 解析错误: {0}")]
  Toml(#[from] toml::de::Error),
  /// 内部不变量被破坏
  #[error("内部错误: {0}")]
  Internal(String),
}

impl Error {
  pub fn config(msg: impl Into<String>) -> Self {
    Error::Configuration(msg.into())
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Error::Internal(msg.into())
  }

  pub fn detection<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Detection(Box::new(err))
  }

  pub fn classifier<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Classifier(Box::new(err))
  }

  /// 是否属于“介质不可读/不可写”一类的错误
  pub fn is_io(&self) -> bool {
    match self {
      Error::Io(_) | Error::Image(_) => true,
      Error::Input(err) => err.is_io(),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
