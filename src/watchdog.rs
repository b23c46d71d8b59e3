//! 监督进程一侧的看门狗定时器
//!
//! 到点后处理器先在共享区置起 `timer_first`，再整组强杀被监控进程。
//! 处理器上下文只允许共享区的普通字段写和 async-signal-safe 的系统调用。

use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicPtr, Ordering};

use log::debug;
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{alarm, Pid};

use crate::error::FoxBoxError;
use crate::shared::{self, SharedJudgeState};

// SIGALRM 处理器只能通过这两个原子量拿到状态，arm/disarm 之外不暴露
static WATCHED_PGRP: AtomicI32 = AtomicI32::new(0);
static SHARED_STATE: AtomicPtr<SharedJudgeState> = AtomicPtr::new(ptr::null_mut());

extern "C" fn on_alarm(_signo: libc::c_int) {
  // 先置标志再动手，回收逻辑靠这个标志裁决竞争
  let state = SHARED_STATE.load(Ordering::SeqCst);
  if !state.is_null() {
    shared::mark_timer_first(state);
  }

  let pgrp = WATCHED_PGRP.load(Ordering::SeqCst);
  if pgrp > 0 {
    unsafe {
      libc::kill(-pgrp, libc::SIGKILL);
    }
  }
}

/// 安装 SIGALRM 处理器并启动倒计时
///
/// 不带 SA_RESTART：wait4 要能被打断并观察到 EINTR
pub(crate) fn arm(
  pgrp: Pid,
  state: *mut SharedJudgeState,
  seconds: u32,
) -> Result<(), FoxBoxError> {
  WATCHED_PGRP.store(pgrp.as_raw(), Ordering::SeqCst);
  SHARED_STATE.store(state, Ordering::SeqCst);

  let action = SigAction::new(SigHandler::Handler(on_alarm), SaFlags::empty(), SigSet::all());
  unsafe { sigaction(Signal::SIGALRM, &action) }?;

  alarm::set(seconds);
  debug!("Arm watchdog for {} seconds", seconds);

  Ok(())
}

/// 回收完成后解除定时器并清空处理器状态
pub(crate) fn disarm() {
  alarm::cancel();
  WATCHED_PGRP.store(0, Ordering::SeqCst);
  SHARED_STATE.store(ptr::null_mut(), Ordering::SeqCst);
  debug!("Disarm watchdog");
}
