//! 父子进程共享的评测状态区
//!
//! 匿名 `MAP_SHARED` 映射，fork 之后双方看到同一块内存，不需要管道或文件
//! 中转。区内没有锁：看门狗处理器和回收逻辑按约定写互不重叠的字段，
//! `timer_first` 和 `status` 接受 last-writer-wins。

use std::mem;
use std::num::NonZeroUsize;
use std::ptr;
use std::time::Duration;

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use crate::sio;
use crate::usage::ResourceUsage;

/// 共享区的内存布局，所有字段都可能被另一个执行上下文读到
#[repr(C)]
pub struct SharedJudgeState {
  user_us: i64,
  sys_us: i64,
  max_rss_kb: i64,
  timer_first: i32,
  status: i32,
}

/// 共享映射的句柄，由沙盒控制器独占持有
///
/// `release` 按值消耗句柄，释放恰好一次，释放后无法再访问
pub struct SharedState {
  ptr: *mut SharedJudgeState,
}

impl SharedState {
  /// 建立恰好放下一个 [`SharedJudgeState`] 的匿名共享映射
  ///
  /// 映射失败是致命错误：没有共享区就没有可信的评测结论
  pub fn new() -> SharedState {
    let len = NonZeroUsize::new(mem::size_of::<SharedJudgeState>()).unwrap();
    let ptr = unsafe {
      mmap(
        None,
        len,
        ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
        MapFlags::MAP_SHARED | MapFlags::MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    match ptr {
      Ok(ptr) => SharedState {
        ptr: ptr as *mut SharedJudgeState,
      },
      Err(_) => sio::fatal(b"mmap shared state error"),
    }
  }

  /// 交给信号处理器使用的裸指针
  pub(crate) fn as_ptr(&self) -> *mut SharedJudgeState {
    self.ptr
  }

  /// 回收侧写入：终止状态字和资源用量
  pub(crate) fn record(&self, status: i32, usage: &ResourceUsage) {
    unsafe {
      ptr::write_volatile(
        ptr::addr_of_mut!((*self.ptr).user_us),
        usage.user_time.as_micros() as i64,
      );
      ptr::write_volatile(
        ptr::addr_of_mut!((*self.ptr).sys_us),
        usage.system_time.as_micros() as i64,
      );
      ptr::write_volatile(
        ptr::addr_of_mut!((*self.ptr).max_rss_kb),
        usage.max_resident_kb as i64,
      );
      ptr::write_volatile(ptr::addr_of_mut!((*self.ptr).status), status);
    }
  }

  pub(crate) fn status(&self) -> i32 {
    unsafe { ptr::read_volatile(ptr::addr_of!((*self.ptr).status)) }
  }

  pub(crate) fn timer_first(&self) -> bool {
    unsafe { ptr::read_volatile(ptr::addr_of!((*self.ptr).timer_first)) != 0 }
  }

  pub(crate) fn usage(&self) -> ResourceUsage {
    unsafe {
      ResourceUsage {
        user_time: Duration::from_micros(
          ptr::read_volatile(ptr::addr_of!((*self.ptr).user_us)).max(0) as u64,
        ),
        system_time: Duration::from_micros(
          ptr::read_volatile(ptr::addr_of!((*self.ptr).sys_us)).max(0) as u64,
        ),
        max_resident_kb: ptr::read_volatile(ptr::addr_of!((*self.ptr).max_rss_kb)).max(0) as u64,
      }
    }
  }

  /// 解除映射，恰好调用一次
  pub fn release(self) {
    let result = unsafe { munmap(self.ptr as *mut _, mem::size_of::<SharedJudgeState>()) };
    if result.is_err() {
      sio::fatal(b"munmap shared state error");
    }
  }
}

/// 处理器上下文专用：置起 timer_first 标志
///
/// 必须是处理器做的第一件事，然后才允许杀进程组
pub(crate) fn mark_timer_first(state: *mut SharedJudgeState) {
  unsafe {
    ptr::write_volatile(ptr::addr_of_mut!((*state).timer_first), 1);
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[test]
  fn two_writers_last_write_wins() {
    let state = SharedState::new();
    assert!(!state.timer_first());
    assert_eq!(state.status(), 0);

    // 模拟看门狗处理器：只碰 timer_first
    mark_timer_first(state.as_ptr());

    // 模拟回收逻辑：写状态字和用量
    let usage = ResourceUsage {
      user_time: Duration::from_millis(120),
      system_time: Duration::from_millis(30),
      max_resident_kb: 2048,
    };
    state.record(42 << 8, &usage);
    state.record(9, &usage);

    assert!(state.timer_first());
    assert_eq!(state.status(), 9);
    let read_back = state.usage();
    assert_eq!(read_back.user_time, Duration::from_millis(120));
    assert_eq!(read_back.system_time, Duration::from_millis(30));
    assert_eq!(read_back.max_resident_kb, 2048);

    state.release();
  }
}
