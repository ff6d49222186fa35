// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/dataset/loader.rs - 批量加载
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

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use super::{ImageFolder, Pipeline};
use crate::{Error, Result, frame::NchwTensor};

#[derive(Debug, Clone)]
pub struct Batch {
  pub pixel_values: Vec<NchwTensor>,
  pub labels: Vec<usize>,
}

impl Batch {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

/// 一个 epoch 的样本顺序，训练集每次重新打乱
pub fn epoch_order<R: Rng + ?Sized>(len: usize, shuffle: bool, rng: &mut R) -> Vec<usize> {
  let mut order: Vec<usize> = (0..len).collect();
  if shuffle {
    order.shuffle(rng);
  }
  order
}

/// 在固定大小的线程池里解码和增强图片
///
/// 每个样本使用独立的随机种子，结果与线程调度无关，批内顺序与输入一致。
pub struct DataLoader {
  pool: ThreadPool,
  batch_size: usize,
}

impl DataLoader {
  pub fn new(batch_size: usize, num_workers: usize) -> Result<Self> {
    if batch_size == 0 {
      return Err(Error::config("batch_size 必须大于 0"));
    }
    let pool = ThreadPoolBuilder::new()
      .num_threads(num_workers.max(1))
      .thread_name(|i| format!("vogel-loader-{}", i))
      .build()
      .map_err(|e| Error::config(format!("无法创建加载线程池: {}", e)))?;
    debug!("数据加载线程数: {}", pool.current_num_threads());
    Ok(Self { pool, batch_size })
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }

  pub fn num_batches(&self, len: usize) -> usize {
    len.div_ceil(self.batch_size)
  }

  /// 按 `indices` 的顺序加载一个批次
  pub fn load<R: RngCore + ?Sized>(
    &self,
    dataset: &ImageFolder,
    indices: &[usize],
    pipeline: &Pipeline,
    rng: &mut R,
  ) -> Result<Batch> {
    let jobs = indices
      .iter()
      .map(|&i| {
        dataset
          .samples()
          .get(i)
          .map(|sample| (sample, rng.next_u64()))
          .ok_or_else(|| Error::internal(format!("样本下标越界: {}", i)))
      })
      .collect::<Result<Vec<_>>>()?;

    let pixel_values = self.pool.install(|| {
      jobs
        .par_iter()
        .map(|(sample, seed)| {
          let image = image::open(&sample.path)?.to_rgb8();
          let mut rng = StdRng::seed_from_u64(*seed);
          Ok(pipeline.apply(image, &mut rng))
        })
        .collect::<Result<Vec<_>>>()
    })?;
    let labels = jobs.iter().map(|(sample, _)| sample.label).collect();

    Ok(Batch {
      pixel_values,
      labels,
    })
  }
}
