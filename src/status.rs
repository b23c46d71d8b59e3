//! wait 状态字的解码

use nix::libc;

/// 子进程的终止方式
///
/// 总是和同一次 wait 调用取回的 [`crate::ResourceUsage`] 成对产生
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
  /// 自行退出，携带退出码
  NormalExit(i32),
  /// 被信号终止，携带信号编号
  Signaled(i32),
}

impl TerminationOutcome {
  /// 是否是限制违规的信号终止（CPU 时限信号或强杀信号）
  ///
  /// 内存超限没有专属信号，语义分类留给调用方
  pub fn limit_signal(&self) -> bool {
    matches!(
      self,
      TerminationOutcome::Signaled(sig) if *sig == libc::SIGXCPU || *sig == libc::SIGKILL
    )
  }
}

/// 从 wait 的原始状态字解码终止方式
///
/// 位级解码收在这一个函数后面，调用方不碰 W* 宏
pub fn decode(raw: i32) -> TerminationOutcome {
  if libc::WIFEXITED(raw) {
    TerminationOutcome::NormalExit(libc::WEXITSTATUS(raw))
  } else if libc::WIFSIGNALED(raw) {
    TerminationOutcome::Signaled(libc::WTERMSIG(raw))
  } else {
    // wait4 不带 WUNTRACED/WCONTINUED，停止和继续状态不会出现
    unreachable!("unexpected wait status {raw:#x}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_normal_exit() {
    assert_eq!(decode(0), TerminationOutcome::NormalExit(0));
    assert_eq!(decode(42 << 8), TerminationOutcome::NormalExit(42));
    assert_eq!(decode(255 << 8), TerminationOutcome::NormalExit(255));
  }

  #[test]
  fn decode_signaled() {
    assert_eq!(decode(libc::SIGKILL), TerminationOutcome::Signaled(libc::SIGKILL));
    assert_eq!(decode(libc::SIGSEGV), TerminationOutcome::Signaled(libc::SIGSEGV));
    assert_eq!(decode(libc::SIGXCPU), TerminationOutcome::Signaled(libc::SIGXCPU));
  }

  #[test]
  fn limit_signals() {
    assert!(TerminationOutcome::Signaled(libc::SIGXCPU).limit_signal());
    assert!(TerminationOutcome::Signaled(libc::SIGKILL).limit_signal());
    assert!(!TerminationOutcome::Signaled(libc::SIGSEGV).limit_signal());
    assert!(!TerminationOutcome::NormalExit(1).limit_signal());
  }
}
