// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/train/early_stopping.rs - 提前停止
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
  /// 指标严格优于此前最佳
  Improved,
  NoImprovement { waited: usize },
  Stop,
}

/// 连续 `patience` 次评估没有严格提升时停止
#[derive(Debug, Clone)]
pub struct EarlyStopping {
  patience: usize,
  best: Option<(usize, f64)>,
  waited: usize,
}

impl EarlyStopping {
  pub fn new(patience: usize) -> Self {
    Self {
      patience,
      best: None,
      waited: 0,
    }
  }

  pub fn observe(&mut self, epoch: usize, metric: f64) -> Verdict {
    let improved = match self.best {
      None => true,
      Some((_, best)) => metric > best,
    };
    if improved {
      self.best = Some((epoch, metric));
      self.waited = 0;
      return Verdict::Improved;
    }

    self.waited += 1;
    if self.waited >= self.patience {
      Verdict::Stop
    } else {
      Verdict::NoImprovement {
        waited: self.waited,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stops_patience_epochs_after_last_improvement() {
    let mut stopping = EarlyStopping::new(3);
    let accuracies = [0.2, 0.4, 0.6, 0.6, 0.5, 0.6, 0.9];
    let mut stopped_at = None;
    for (i, acc) in accuracies.iter().enumerate() {
      let epoch = i + 1;
      if stopping.observe(epoch, *acc) == Verdict::Stop {
        stopped_at = Some(epoch);
        break;
      }
    }
    assert_eq!(stopped_at, Some(6));
    assert_eq!(stopping.best, Some((3, 0.6)));
  }

  #[test]
  fn improvement_resets_the_counter() {
    let mut stopping = EarlyStopping::new(2);
    assert_eq!(stopping.observe(1, 0.5), Verdict::Improved);
    assert_eq!(stopping.observe(2, 0.4), Verdict::NoImprovement { waited: 1 });
    assert_eq!(stopping.observe(3, 0.7), Verdict::Improved);
    assert_eq!(stopping.observe(4, 0.7), Verdict::NoImprovement { waited: 1 });
    assert_eq!(stopping.observe(5, 0.1), Verdict::Stop);
    assert_eq!(stopping.best.map(|(epoch, _)| epoch), Some(3));
  }
}
