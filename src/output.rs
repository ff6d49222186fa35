// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/output.rs - 文件输出
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

//! 所有产物都先写到同目录下的 `.<name>.partial`，完成后再改名，
//! 最终文件名下不会出现写了一半的文件。

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::Result;

const PARTIAL_SUFFIX: &str = ".partial";

pub fn partial_path(path: &Path) -> PathBuf {
  let name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  path.with_file_name(format!(".{}{}", name, PARTIAL_SUFFIX))
}

pub fn is_partial(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|name| name.to_str())
    .map(|name| name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX))
    .unwrap_or(false)
}

/// 写入临时文件后改名为 `path`
pub fn publish_file<F>(path: &Path, write: F) -> Result<()>
where
  F: FnOnce(&Path) -> Result<()>,
{
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  let partial = partial_path(path);
  if let Err(e) = write(&partial) {
    if partial.exists()
      && let Err(cleanup) = std::fs::remove_file(&partial)
    {
      warn!("无法清理临时文件 {}: {}", partial.display(), cleanup);
    }
    return Err(e);
  }
  std::fs::rename(&partial, path)?;
  debug!("已写入: {}", path.display());
  Ok(())
}

/// 与 [`publish_file`] 相同，但 `path` 已存在时不覆盖，返回 `false`
///
/// 用硬链接发布，目标名的存在检查与创建是同一个原子操作。
pub fn publish_new_file<F>(path: &Path, write: F) -> Result<bool>
where
  F: FnOnce(&Path) -> Result<()>,
{
  let staged = partial_path(path);
  let linked = publish_file(&staged, write).and_then(|()| {
    match std::fs::hard_link(&staged, path) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
      Err(e) => Err(e.into()),
    }
  });
  if staged.exists()
    && let Err(cleanup) = std::fs::remove_file(&staged)
  {
    warn!("无法清理临时文件 {}: {}", staged.display(), cleanup);
  }
  if let Ok(true) = linked {
    debug!("已写入: {}", path.display());
  }
  linked
}

/// 整个目录写完后再改名为 `dir`，已存在的同名目录会被替换
pub fn publish_dir<F>(dir: &Path, write: F) -> Result<()>
where
  F: FnOnce(&Path) -> Result<()>,
{
  let partial = partial_path(dir);
  if partial.exists() {
    std::fs::remove_dir_all(&partial)?;
  }
  std::fs::create_dir_all(&partial)?;

  if let Err(e) = write(&partial) {
    if let Err(cleanup) = std::fs::remove_dir_all(&partial) {
      warn!("无法清理临时目录 {}: {}", partial.display(), cleanup);
    }
    return Err(e);
  }

  if dir.exists() {
    std::fs::remove_dir_all(dir)?;
  }
  std::fs::rename(&partial, dir)?;
  debug!("已写入目录: {}", dir.display());
  Ok(())
}

/// 不覆盖已有文件，已存在时返回 `false`
pub fn save_new_jpeg(image: &RgbImage, path: &Path) -> Result<bool> {
  publish_new_file(path, |partial| {
    image.save_with_format(partial, ImageFormat::Jpeg)?;
    Ok(())
  })
}

pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
  publish_file(path, |partial| {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(partial, text)?;
    Ok(())
  })
}

pub fn copy_file(source: &Path, destination: &Path) -> Result<()> {
  publish_file(destination, |partial| {
    std::fs::copy(source, partial)?;
    Ok(())
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_names_are_hidden() {
    let path = Path::new("/data/out/bird_000001_0001_conf0.50.jpg");
    let partial = partial_path(path);
    assert_eq!(
      partial,
      Path::new("/data/out/.bird_000001_0001_conf0.50.jpg.partial")
    );
    assert!(is_partial(&partial));
    assert!(!is_partial(path));
  }

  #[test]
  fn failed_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("stats.json");
    let result = publish_file(&target, |partial| {
      std::fs::write(partial, "{")?;
      Err(crate::Error::config("boom"))
    });
    assert!(result.is_err());
    assert!(!target.exists());
    assert!(!partial_path(&target).exists());
  }

  #[test]
  fn publish_new_file_never_clobbers() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("bird_000000_0001_conf0.90.jpg");

    assert!(publish_new_file(&target, |partial| Ok(std::fs::write(partial, "first")?)).unwrap());
    assert!(!publish_new_file(&target, |partial| Ok(std::fs::write(partial, "second")?)).unwrap());

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "first");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().path())
      .filter(|p| is_partial(p))
      .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
  }

  #[test]
  fn publish_dir_replaces_existing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("checkpoint-1");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("old.txt"), "old").unwrap();

    publish_dir(&target, |partial| {
      std::fs::write(partial.join("new.txt"), "new")?;
      Ok(())
    })
    .unwrap();

    assert!(target.join("new.txt").exists());
    assert!(!target.join("old.txt").exists());
    assert!(!partial_path(&target).exists());
  }

  #[test]
  fn copy_and_json_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("a/report.json");
    write_json(&serde_json::json!({"total": 3}), &json).unwrap();
    let copied = dir.path().join("b/report.json");
    copy_file(&json, &copied).unwrap();
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(copied).unwrap()).unwrap();
    assert_eq!(value["total"], 3);
  }
}
