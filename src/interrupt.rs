// 该文件是 Vogel （林间观鸟） 项目的一部分。
// src/interrupt.rs - 中断信号
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

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::{cell::Cell, thread, time::Duration};

use tracing::{info, warn};

use crate::{Error, Result};

/// 收到中断后仍未退出时强制结束进程的等待时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 协作式中断信号
///
/// 收到一次中断后保持触发状态。
pub struct CancelSignal {
  rx: Receiver<()>,
  fired: Cell<bool>,
}

impl CancelSignal {
  /// 由调用方通过返回的 `Sender` 触发中断
  pub fn channel() -> (Sender<()>, Self) {
    let (tx, rx) = mpsc::channel();
    (
      tx,
      Self {
        rx,
        fired: Cell::new(false),
      },
    )
  }

  /// 永不触发的信号
  pub fn never() -> Self {
    let (_tx, signal) = Self::channel();
    signal
  }

  /// 安装 Ctrl-C 处理函数
  ///
  /// 每个进程只能调用一次。
  pub fn ctrlc() -> Result<Self> {
    let (tx, signal) = Self::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .map_err(|e| Error::config(format!("无法设置 Ctrl-C 处理函数: {}", e)))?;

    Ok(signal)
  }

  pub fn is_cancelled(&self) -> bool {
    if self.fired.get() {
      return true;
    }
    match self.rx.try_recv() {
      Ok(()) => {
        self.fired.set(true);
        true
      }
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
    }
  }
}
