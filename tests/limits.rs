use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::info;
use nix::libc::{SIGKILL, SIGTERM, SIGXCPU};

use foxj::{run, FoxBoxParams, TerminationOutcome};

mod common;

// run() 安装进程级的信号处理器，用例串行执行
static LOCK: Mutex<()> = Mutex::new(());

fn spin_params() -> FoxBoxParams {
  FoxBoxParams::new(
    "/bin/sh",
    vec!["-c".to_string(), "while :; do :; done".to_string()],
  )
}

#[test]
fn watchdog_kills_spinning_child() {
  common::setup();
  let _guard = LOCK.lock().unwrap();

  let mut params = spin_params();
  // CPU 限放得很宽，先到点的一定是看门狗
  params.cpu_limit(10, 11).watchdog(1);

  let start = Instant::now();
  let report = run(&params).unwrap();
  let elapsed = start.elapsed();

  info!("Watchdog report: {} (elapsed {:?})", report, elapsed);
  assert_eq!(report.outcome, TerminationOutcome::Signaled(SIGKILL));
  assert!(report.timer_first);
  assert!(report.limit_exceeded());
  assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn cpu_limit_kills_spinning_child() {
  common::setup();
  let _guard = LOCK.lock().unwrap();

  let mut params = spin_params();
  params.cpu_limit(1, 2).watchdog(10);

  let start = Instant::now();
  let report = run(&params).unwrap();
  let elapsed = start.elapsed();

  info!("CPU limit report: {} (elapsed {:?})", report, elapsed);
  assert_eq!(report.outcome, TerminationOutcome::Signaled(SIGXCPU));
  assert!(!report.timer_first);
  assert!(report.limit_exceeded());
  assert!(report.usage.cpu_time() >= Duration::from_millis(500));
  assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn external_signal_is_not_limit_violation() {
  common::setup();
  let _guard = LOCK.lock().unwrap();

  let params = FoxBoxParams::new(
    "/bin/sh",
    vec!["-c".to_string(), "kill -TERM $$".to_string()],
  );
  let report = run(&params).unwrap();

  assert_eq!(report.outcome, TerminationOutcome::Signaled(SIGTERM));
  assert!(!report.timer_first);
  assert!(!report.limit_exceeded());
}
