//! fork / exec / monitor 控制流
//!
//! 监督进程 fork 出子进程；子进程施加资源限制、重定向标准流之后 exec
//! 不可信程序；监督进程带着 rusage 阻塞等待，配合看门狗裁决超限。
//! 子进程分支从 fork 到 exec 只做 async-signal-safe 的事，需要的内存
//! 全部在 fork 之前准备好。

use std::ffi::CString;

use log::{debug, info};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::signal::{kill, sigprocmask, SigSet, SigmaskHow, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{close, dup2, fork, setpgid, ForkResult, Pid};

use crate::context::{FoxBoxParams, RunReport};
use crate::error::FoxBoxError;
use crate::limits::LimitSet;
use crate::shared::SharedState;
use crate::sio;
use crate::status;
use crate::usage::ResourceUsage;
use crate::utils::{into_c_string, to_c_array};
use crate::watchdog;

/// 在沙盒中运行一个不可信程序直到终止，返回终止方式和资源用量
pub fn run(params: &FoxBoxParams) -> Result<RunReport, FoxBoxError> {
  // exec 需要的 CString 和指针数组全部在 fork 之前构造
  let program = into_c_string(&params.program);
  let args = [
    vec![program.clone()],
    params
      .arguments
      .iter()
      .map(|arg| into_c_string(arg))
      .collect(),
  ]
  .concat();
  let envs = params
    .env
    .iter()
    .map(|(key, value)| into_c_string(&format!("{}={}", key, value)))
    .collect::<Vec<CString>>();
  let argv = to_c_array(&args);
  let envp = to_c_array(&envs);

  let stdin_path = params.stdin.as_ref().map(|p| into_c_string(p));
  let stdout_path = params.stdout.as_ref().map(|p| into_c_string(p));
  let stderr_path = params.stderr.as_ref().map(|p| into_c_string(p));

  let shared = SharedState::new();

  // fork 窗口内屏蔽子进程终止、中断、终端停止信号，设置完再恢复
  let mut sensitive = SigSet::empty();
  sensitive.add(Signal::SIGCHLD);
  sensitive.add(Signal::SIGINT);
  sensitive.add(Signal::SIGTSTP);
  let mut prev_mask = SigSet::empty();
  sigprocmask(SigmaskHow::SIG_BLOCK, Some(&sensitive), Some(&mut prev_mask))?;

  match unsafe { fork() } {
    Ok(ForkResult::Parent { child, .. }) => {
      info!("Start monitoring child process (pid = {})", child);

      // 子进程自己也会 setpgid(0, 0)，两边都设避免竞争窗口
      let _ = setpgid(child, child);

      if let Err(err) = watchdog::arm(child, shared.as_ptr(), params.watchdog_deadline()) {
        let _ = kill(child, Signal::SIGKILL);
        let _ = waitpid(child, None);
        let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&prev_mask), None);
        shared.release();
        return Err(err);
      }

      sigprocmask(SigmaskHow::SIG_SETMASK, Some(&prev_mask), None)?;

      let wait_result = wait_with_usage(child);
      watchdog::disarm();
      let (raw, usage) = match wait_result {
        Ok(reaped) => reaped,
        Err(err) => {
          shared.release();
          return Err(err);
        }
      };

      // 回收侧写入共享区，结论从共享区读出
      shared.record(raw, &usage);
      let report = RunReport {
        outcome: status::decode(shared.status()),
        usage: shared.usage(),
        timer_first: shared.timer_first(),
      };
      shared.release();

      match report.outcome {
        status::TerminationOutcome::NormalExit(code) => {
          info!("Child process #{}. exited with status {}", child, code);
        }
        status::TerminationOutcome::Signaled(sig) => {
          info!("Child process #{}. is signaled by {}", child, sig);
        }
      }
      debug!("Child usage: {:?}", report.usage);

      Ok(report)
    }
    Ok(ForkResult::Child) => child_exec(
      &program,
      &argv,
      &envp,
      stdin_path.as_deref(),
      stdout_path.as_deref(),
      stderr_path.as_deref(),
      &params.limits,
    ),
    Err(errno) => {
      let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&prev_mask), None);
      shared.release();
      Err(FoxBoxError::fork(errno.to_string()))
    }
  }
}

/// 子进程分支：限制、重定向、恢复信号掩码、exec，永不返回
///
/// 任何一步失败都经 sio 立即退出，绝不回到和父进程共享的代码路径
fn child_exec(
  program: &CString,
  argv: &[*const libc::c_char],
  envp: &[*const libc::c_char],
  stdin_path: Option<&std::ffi::CStr>,
  stdout_path: Option<&std::ffi::CStr>,
  stderr_path: Option<&std::ffi::CStr>,
  limits: &LimitSet,
) -> ! {
  if setpgid(Pid::from_raw(0), Pid::from_raw(0)).is_err() {
    sio::fatal(b"setpgid error");
  }

  limits.apply();

  redirect_stdio(stdin_path, stdout_path, stderr_path);

  // 不可信程序不能继承监督进程的屏蔽策略
  let empty = SigSet::empty();
  if sigprocmask(SigmaskHow::SIG_SETMASK, Some(&empty), None).is_err() {
    sio::fatal(b"sigprocmask error");
  }

  unsafe {
    libc::execvpe(program.as_ptr(), argv.as_ptr(), envp.as_ptr());
  }
  sio::fatal(b"execvpe error")
}

/// 重定向标准输入输出到指定文件，0644 截断写
fn redirect_stdio(
  stdin_path: Option<&std::ffi::CStr>,
  stdout_path: Option<&std::ffi::CStr>,
  stderr_path: Option<&std::ffi::CStr>,
) {
  let write_mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
  let write_flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;

  if let Some(path) = stdin_path {
    match open(path, OFlag::O_RDONLY, Mode::empty()) {
      Ok(fd) => {
        if dup2(fd, libc::STDIN_FILENO).is_err() {
          sio::fatal(b"dup2 stdin error");
        }
        let _ = close(fd);
      }
      Err(_) => sio::fatal(b"open stdin file error"),
    }
  }

  if let Some(path) = stdout_path {
    match open(path, write_flags, write_mode) {
      Ok(fd) => {
        if dup2(fd, libc::STDOUT_FILENO).is_err() {
          sio::fatal(b"dup2 stdout error");
        }
        let _ = close(fd);
      }
      Err(_) => sio::fatal(b"open stdout file error"),
    }
  }

  if let Some(path) = stderr_path {
    match open(path, write_flags, write_mode) {
      Ok(fd) => {
        if dup2(fd, libc::STDERR_FILENO).is_err() {
          sio::fatal(b"dup2 stderr error");
        }
        let _ = close(fd);
      }
      Err(_) => sio::fatal(b"open stderr file error"),
    }
  }
}

/// 阻塞等待子进程改变状态，同一次系统调用里取回 rusage
///
/// 不能先 waitpid 再 getrusage：回收的一刻内核就释放了记账，
/// 事后查询读到的是零或者垃圾
fn wait_with_usage(child: Pid) -> Result<(i32, ResourceUsage), FoxBoxError> {
  let mut raw_status: libc::c_int = 0;
  let mut ru: libc::rusage = unsafe { std::mem::zeroed() };

  loop {
    let rc = unsafe { libc::wait4(child.as_raw(), &mut raw_status, 0, &mut ru) };
    if rc == child.as_raw() {
      return Ok((raw_status, ResourceUsage::from_raw(&ru)));
    }
    if rc < 0 {
      let errno = Errno::last();
      if errno == Errno::EINTR {
        // 看门狗打断了等待，重试直到真正回收
        continue;
      }
      return Err(FoxBoxError::from(errno));
    }
    unreachable!("wait4 returned unexpected pid {rc}");
  }
}
