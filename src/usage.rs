//! 资源用量的采集与表示

use std::time::Duration;

use nix::libc;
use nix::sys::resource::{getrusage, UsageWho};

use crate::error::FoxBoxError;

/// 内核 rusage 记录的一次快照，捕获后不再修改
///
/// 只从资源统计系统调用构造：`wait4` 的出参、`getrusage(SELF)`、
/// `getrusage(CHILDREN)`，绝不手工拼装
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
  /// 用户态 CPU 时间
  pub user_time: Duration,
  /// 内核态 CPU 时间
  pub system_time: Duration,
  /// 峰值常驻内存 (KB)
  pub max_resident_kb: u64,
}

impl ResourceUsage {
  pub(crate) fn from_raw(ru: &libc::rusage) -> Self {
    ResourceUsage {
      user_time: timeval_duration(ru.ru_utime.tv_sec as i64, ru.ru_utime.tv_usec as i64),
      system_time: timeval_duration(ru.ru_stime.tv_sec as i64, ru.ru_stime.tv_usec as i64),
      max_resident_kb: ru.ru_maxrss.max(0) as u64,
    }
  }

  /// 用户态与内核态时间之和，评测时限按这个衡量
  pub fn cpu_time(&self) -> Duration {
    self.user_time + self.system_time
  }
}

fn timeval_duration(sec: i64, usec: i64) -> Duration {
  Duration::new(sec.max(0) as u64, (usec.max(0) as u32) * 1000)
}

fn collect(who: UsageWho) -> Result<ResourceUsage, FoxBoxError> {
  let usage = getrusage(who)?;
  let user = usage.user_time();
  let sys = usage.system_time();
  Ok(ResourceUsage {
    user_time: timeval_duration(user.tv_sec() as i64, user.tv_usec() as i64),
    system_time: timeval_duration(sys.tv_sec() as i64, sys.tv_usec() as i64),
    max_resident_kb: usage.max_rss().max(0) as u64,
  })
}

/// 调用进程自身的累计用量
pub fn collect_self_usage() -> Result<ResourceUsage, FoxBoxError> {
  collect(UsageWho::RUSAGE_SELF)
}

/// 所有已回收子进程的聚合用量
///
/// 多个后代进程只需要总量时用这个，单个子进程的精确值以 `wait4` 为准
pub fn collect_children_usage() -> Result<ResourceUsage, FoxBoxError> {
  collect(UsageWho::RUSAGE_CHILDREN)
}
