//! Async-signal-safe IO
//!
//! 此模块中的所有函数都必须保持 async-signal-safe：不分配堆内存，不加锁，
//! 只使用可重入的系统调用。信号处理器和 fork 之后 exec 之前的窗口内，
//! 诊断输出只允许走这里，不允许走 `log` 或者带缓冲的格式化输出。

use nix::errno::Errno;
use nix::libc;

pub const STDIN_FILENO: i32 = libc::STDIN_FILENO;
pub const STDOUT_FILENO: i32 = libc::STDOUT_FILENO;
pub const STDERR_FILENO: i32 = libc::STDERR_FILENO;

/// 向文件描述符写出字节串，单次 write 系统调用
pub fn write_bytes(fd: i32, s: &[u8]) -> isize {
  unsafe { libc::write(fd, s.as_ptr() as *const libc::c_void, s.len()) }
}

/// 十进制输出有符号整数（K&R itoa：反复除十写入栈上缓冲区，原地反转）
pub fn write_long(fd: i32, v: i64) -> isize {
  // 20 位数字 + 符号位
  let mut buf = [0u8; 24];
  let mut i = 0;

  // i64::MIN 直接取负会溢出，幅值统一用 u64 计算
  let negative = v < 0;
  let mut m = v.unsigned_abs();

  loop {
    buf[i] = b'0' + (m % 10) as u8;
    i += 1;
    m /= 10;
    if m == 0 {
      break;
    }
  }
  if negative {
    buf[i] = b'-';
    i += 1;
  }
  buf[..i].reverse();

  write_bytes(fd, &buf[..i])
}

/// 写出诊断信息和当前 errno，然后立即终止进程
///
/// 受限上下文里系统调用失败后唯一的报错出口，永不返回
pub fn fatal(msg: &[u8]) -> ! {
  write_bytes(STDERR_FILENO, msg);
  write_bytes(STDERR_FILENO, b" (errno = ");
  write_long(STDERR_FILENO, Errno::last() as i64);
  write_bytes(STDERR_FILENO, b")\n");
  unsafe { libc::_exit(1) }
}
