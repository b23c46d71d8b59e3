//! Checker 调用边界
//!
//! 沙盒对打分算法一无所知：边界只负责 chdir 进结果目录、调用绑定的
//! [`Scorer`]、按固定格式输出分数。具体题目把自己的 Scorer 链接进一个
//! 检查器二进制，进程入口是 [`checker_main`]。
//!
//! 结果目录的文件约定：`input`（测试输入）、`output`（选手输出）、
//! `answer`（标准答案）。

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::exit;

use nix::unistd::chdir;

use crate::sio;

/// 选手输出文件名
pub const OUTPUT_FILE: &str = "output";
/// 标准答案文件名
pub const ANSWER_FILE: &str = "answer";

/// 打分能力：在结果目录中执行一次评分
///
/// 返回值始终是有效分数（0 按约定表示错误），不用于传递错误
pub trait Scorer {
  fn score(&self) -> f64;
}

/// chdir 进结果目录后调用打分函数，输出换行加六位小数的分数
///
/// 目录切换失败是致命错误：在错误的目录里打分比崩溃更糟
pub fn invoke_checker(scorer: &dyn Scorer, dir: &str) -> ! {
  if chdir(Path::new(dir)).is_err() {
    sio::write_bytes(
      sio::STDERR_FILENO,
      b"failed to change working directory, path = ",
    );
    sio::write_bytes(sio::STDERR_FILENO, dir.as_bytes());
    sio::fatal(b"");
  }

  let score = scorer.score();

  print!("\n{:.6}", score);
  std::io::stdout().flush().unwrap();
  exit(0);
}

/// 检查器进程入口：唯一的位置参数是结果目录
pub fn checker_main(scorer: &dyn Scorer) -> ! {
  let args = std::env::args().collect::<Vec<String>>();
  if args.len() != 2 {
    eprintln!("invalid argument count, expect 1 argument");
    exit(1);
  }
  invoke_checker(scorer, &args[1])
}

/// 内置检查器：全文逐行精确比较，容忍文末多余的空行
pub struct FileCmp;

impl Scorer for FileCmp {
  fn score(&self) -> f64 {
    if file_cmp(Path::new(OUTPUT_FILE), Path::new(ANSWER_FILE)) {
      1.0
    } else {
      0.0
    }
  }
}

/// 内置检查器：逐 token 比较，精确失配时尝试带容差的浮点比较
pub struct AutoCmp {
  /// 绝对误差：|a - b| < eps 视为相等
  pub float_absolute_eps: f64,
  /// 相对误差：|a - b| / max(|a|, |b|, eps) < eps 视为相等
  pub float_relative_eps: f64,
  /// 比较前统一转小写
  pub to_lower_case: bool,
}

impl Scorer for AutoCmp {
  fn score(&self) -> f64 {
    if token_cmp(
      Path::new(OUTPUT_FILE),
      Path::new(ANSWER_FILE),
      self.float_absolute_eps,
      self.float_relative_eps,
      self.to_lower_case,
    ) {
      1.0
    } else {
      0.0
    }
  }
}

fn file_cmp(output: &Path, answer: &Path) -> bool {
  let Ok(fout) = File::open(output) else {
    return false;
  };
  let Ok(fans) = File::open(answer) else {
    return false;
  };

  let mut outs = BufReader::new(fout).lines();
  let mut anss = BufReader::new(fans).lines();

  loop {
    match (outs.next(), anss.next()) {
      (None, None) => break true,
      (Some(out), Some(ans)) => {
        let (Ok(out), Ok(ans)) = (out, ans) else {
          break false;
        };
        if out != ans {
          break false;
        }
      }
      // 行数不一致时，多出来的必须全是空行
      (Some(out), None) => {
        if !out.map_or(false, |line| line.trim().is_empty()) {
          break false;
        }
      }
      (None, Some(ans)) => {
        if !ans.map_or(false, |line| line.trim().is_empty()) {
          break false;
        }
      }
    }
  }
}

fn token_cmp(output: &Path, answer: &Path, abs_eps: f64, rel_eps: f64, lower: bool) -> bool {
  let Ok(out_text) = std::fs::read_to_string(output) else {
    return false;
  };
  let Ok(ans_text) = std::fs::read_to_string(answer) else {
    return false;
  };

  let mut outs = out_text.split_whitespace();
  let mut anss = ans_text.split_whitespace();

  loop {
    match (outs.next(), anss.next()) {
      (None, None) => break true,
      (Some(out), Some(ans)) => {
        if !token_match(out, ans, abs_eps, rel_eps, lower) {
          break false;
        }
      }
      _ => break false,
    }
  }
}

fn token_match(out: &str, ans: &str, abs_eps: f64, rel_eps: f64, lower: bool) -> bool {
  if out == ans || lower && out.to_lowercase() == ans.to_lowercase() {
    return true;
  }
  let (Ok(out), Ok(ans)) = (out.parse::<f64>(), ans.parse::<f64>()) else {
    return false;
  };
  let delta = (out - ans).abs();
  delta < abs_eps || delta / f64::max(out.abs().max(ans.abs()), rel_eps) < rel_eps
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::PathBuf;

  use tempfile::tempdir;

  use super::*;

  fn write_pair(out: &str, ans: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let out_path = dir.path().join(OUTPUT_FILE);
    let ans_path = dir.path().join(ANSWER_FILE);
    fs::write(&out_path, out).unwrap();
    fs::write(&ans_path, ans).unwrap();
    (dir, out_path, ans_path)
  }

  #[test]
  fn file_cmp_exact_match() {
    let (_dir, out, ans) = write_pair("1 2\n3\n", "1 2\n3\n");
    assert!(file_cmp(&out, &ans));
  }

  #[test]
  fn file_cmp_ignores_trailing_blank_lines() {
    let (_dir, out, ans) = write_pair("42\n\n", "42\n");
    assert!(file_cmp(&out, &ans));
  }

  #[test]
  fn file_cmp_detects_difference() {
    let (_dir, out, ans) = write_pair("42\n", "43\n");
    assert!(!file_cmp(&out, &ans));
    let (_dir, out, ans) = write_pair("42\n1\n", "42\n");
    assert!(!file_cmp(&out, &ans));
  }

  #[test]
  fn file_cmp_missing_file_scores_zero() {
    let dir = tempdir().unwrap();
    let ans = dir.path().join(ANSWER_FILE);
    fs::write(&ans, "42\n").unwrap();
    assert!(!file_cmp(&dir.path().join(OUTPUT_FILE), &ans));
  }

  #[test]
  fn token_cmp_with_float_tolerance() {
    let (_dir, out, ans) = write_pair("0.3333333 hello", "0.3333334 hello");
    assert!(token_cmp(&out, &ans, 1e-6, 1e-6, false));
    let (_dir, out, ans) = write_pair("0.3 hello", "0.4 hello");
    assert!(!token_cmp(&out, &ans, 1e-6, 1e-6, false));
  }

  #[test]
  fn token_cmp_case_folding() {
    let (_dir, out, ans) = write_pair("Yes", "YES");
    assert!(token_cmp(&out, &ans, 1e-6, 1e-6, true));
    assert!(!token_cmp(&out, &ans, 1e-6, 1e-6, false));
  }

  #[test]
  fn token_cmp_count_mismatch() {
    let (_dir, out, ans) = write_pair("1 2 3", "1 2");
    assert!(!token_cmp(&out, &ans, 1e-6, 1e-6, false));
  }
}
