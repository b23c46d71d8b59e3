use std::fmt::{self, Display};

use crate::limits::LimitSet;
use crate::status::TerminationOutcome;
use crate::usage::ResourceUsage;

/// 一次沙盒运行的全部参数
#[derive(Debug, Clone)]
pub struct FoxBoxParams {
  pub program: String,
  pub arguments: Vec<String>,
  pub limits: LimitSet,
  /// 看门狗的墙钟时限（秒），0 表示取 CPU soft 限 + 1 秒兜底
  pub watchdog: u32,
  pub(crate) env: Vec<(String, String)>,
  pub(crate) stdin: Option<String>,
  pub(crate) stdout: Option<String>,
  pub(crate) stderr: Option<String>,
}

impl FoxBoxParams {
  pub fn new<PS: Into<String>>(program: PS, arguments: Vec<String>) -> Self {
    FoxBoxParams {
      program: program.into(),
      arguments,
      limits: LimitSet::default(),
      watchdog: 0,
      env: vec![(
        "PATH".to_string(),
        std::env::var("PATH").unwrap_or("".to_string()),
      )],
      stdin: None,
      stdout: None,
      stderr: None,
    }
  }

  pub fn cpu_limit(self: &mut Self, soft: u64, hard: u64) -> &mut Self {
    self.limits.cpu = (soft, hard);
    self
  }

  pub fn memory_limit(self: &mut Self, bytes: u64) -> &mut Self {
    self.limits.address_space = (bytes, bytes);
    self
  }

  pub fn file_size_limit(self: &mut Self, bytes: u64) -> &mut Self {
    self.limits.file_size = (bytes, bytes);
    self
  }

  pub fn open_files_limit(self: &mut Self, count: u64) -> &mut Self {
    self.limits.open_files = (count, count);
    self
  }

  pub fn stack_limit(self: &mut Self, bytes: u64) -> &mut Self {
    self.limits.stack = (bytes, bytes);
    self
  }

  pub fn watchdog(self: &mut Self, seconds: u32) -> &mut Self {
    self.watchdog = seconds;
    self
  }

  pub fn stdin<PS: Into<String>>(self: &mut Self, path: Option<PS>) -> &mut Self {
    self.stdin = path.map(|p| p.into());
    self
  }

  pub fn stdout<PS: Into<String>>(self: &mut Self, path: Option<PS>) -> &mut Self {
    self.stdout = path.map(|p| p.into());
    self
  }

  pub fn stderr<PS: Into<String>>(self: &mut Self, path: Option<PS>) -> &mut Self {
    self.stderr = path.map(|p| p.into());
    self
  }

  pub fn env<KS: Into<String>, VS: Into<String>>(self: &mut Self, key: KS, value: VS) -> &mut Self {
    self.env.push((key.into(), value.into()));
    self
  }

  /// 看门狗实际生效的秒数
  pub(crate) fn watchdog_deadline(&self) -> u32 {
    if self.watchdog > 0 {
      self.watchdog
    } else {
      self.limits.cpu.0.saturating_add(1).min(u32::MAX as u64) as u32
    }
  }
}

/// 一次运行的结论：原始终止方式、资源用量、看门狗标志
///
/// 被监控程序崩溃、超限都是正常结果，编码成数据交给调用方分类
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
  pub outcome: TerminationOutcome,
  pub usage: ResourceUsage,
  /// 看门狗先于进程退出触发；置位时终止一律按超限上报
  pub timer_first: bool,
}

impl RunReport {
  /// 是否超出限制：看门狗先触发，或者被 CPU 时限信号终止
  pub fn limit_exceeded(&self) -> bool {
    self.timer_first
      || matches!(self.outcome, TerminationOutcome::Signaled(sig) if sig == nix::libc::SIGXCPU)
  }
}

impl Display for RunReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let outcome = match self.outcome {
      TerminationOutcome::NormalExit(code) => format!("exit:{}", code),
      TerminationOutcome::Signaled(sig) => format!("signal:{}", sig),
    };
    write!(
      f,
      "outcome={} user_ms={} sys_ms={} rss_kb={} timer_first={}",
      outcome,
      self.usage.user_time.as_millis(),
      self.usage.system_time.as_millis(),
      self.usage.max_resident_kb,
      self.timer_first,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn watchdog_falls_back_to_cpu_limit() {
    let mut params = FoxBoxParams::new("/bin/true", vec![]);
    params.cpu_limit(2, 3);
    assert_eq!(params.watchdog_deadline(), 3);
    params.watchdog(10);
    assert_eq!(params.watchdog_deadline(), 10);
  }

  #[test]
  fn limit_exceeded_trusts_timer_flag() {
    let usage = ResourceUsage {
      user_time: Default::default(),
      system_time: Default::default(),
      max_resident_kb: 0,
    };
    let report = RunReport {
      outcome: TerminationOutcome::NormalExit(0),
      usage,
      timer_first: true,
    };
    assert!(report.limit_exceeded());

    let report = RunReport {
      outcome: TerminationOutcome::Signaled(nix::libc::SIGXCPU),
      usage,
      timer_first: false,
    };
    assert!(report.limit_exceeded());

    let report = RunReport {
      outcome: TerminationOutcome::Signaled(nix::libc::SIGTERM),
      usage,
      timer_first: false,
    };
    assert!(!report.limit_exceeded());
  }
}
