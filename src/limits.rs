//! 施加到被监控子进程的资源上限

use nix::sys::resource::{setrlimit, Resource};

use crate::sio;

/// 每类 POSIX 资源一组 (soft, hard) 上限
///
/// 只在 fork 之后 exec 之前施加到子进程，此后不再放宽
#[derive(Debug, Clone, Copy)]
pub struct LimitSet {
  /// CPU 时间（秒），超出后内核发 SIGXCPU
  pub cpu: (u64, u64),
  /// 虚拟地址空间（字节）
  pub address_space: (u64, u64),
  /// 单个输出文件大小（字节），超出后内核发 SIGXFSZ
  pub file_size: (u64, u64),
  /// 同时打开的文件描述符数
  pub open_files: (u64, u64),
  /// 栈空间（字节）
  pub stack: (u64, u64),
}

impl Default for LimitSet {
  fn default() -> Self {
    LimitSet {
      cpu: (60, 60),
      address_space: (1 << 30, 1 << 30),
      file_size: (256 * 1024 * 1024, 256 * 1024 * 1024),
      open_files: (100, 100),
      stack: (1 << 30, 1 << 30),
    }
  }
}

impl LimitSet {
  /// 子进程上下文：逐类施加全部上限
  ///
  /// 任何一类失败都立即致命退出，半受限的子进程绝不能执行不可信代码
  pub(crate) fn apply(&self) {
    apply_one(Resource::RLIMIT_CPU, self.cpu, b"setrlimit cpu error");
    apply_one(Resource::RLIMIT_AS, self.address_space, b"setrlimit as error");
    apply_one(Resource::RLIMIT_FSIZE, self.file_size, b"setrlimit fsize error");
    apply_one(Resource::RLIMIT_NOFILE, self.open_files, b"setrlimit nofile error");
    apply_one(Resource::RLIMIT_STACK, self.stack, b"setrlimit stack error");
  }
}

fn apply_one(resource: Resource, limit: (u64, u64), msg: &[u8]) {
  if setrlimit(resource, limit.0, limit.1).is_err() {
    sio::fatal(msg);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_limits_are_consistent() {
    let limits = LimitSet::default();
    assert!(limits.cpu.0 <= limits.cpu.1);
    assert!(limits.address_space.0 <= limits.address_space.1);
    assert!(limits.file_size.0 <= limits.file_size.1);
    assert!(limits.open_files.0 <= limits.open_files.1);
    assert!(limits.stack.0 <= limits.stack.1);
  }
}
