use std::{
  error::Error,
  fmt::{Debug, Display},
  process::{ExitCode, Termination},
};

use flexi_logger::FlexiLoggerError;
use nix::{errno::Errno, libc::STDOUT_FILENO, unistd::isatty};

pub enum FoxBoxError {
  Fork(String),
  Nix(Errno),
  Fs(String),
  Cli(String),
  Logger(FlexiLoggerError),
}

pub enum FoxBoxExit {
  Ok,
  Err(FoxBoxError),
}

impl FoxBoxError {
  pub fn fork<MS: Into<String>>(msg: MS) -> FoxBoxError {
    FoxBoxError::Fork(msg.into())
  }

  pub fn cli<MS: Into<String>>(msg: MS) -> FoxBoxError {
    FoxBoxError::Cli(msg.into())
  }
}

impl Debug for FoxBoxError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    std::fmt::Display::fmt(&self, f)
  }
}

impl Display for FoxBoxError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self {
      FoxBoxError::Fork(msg) => f.write_fmt(format_args!("FoxBox Fork Error: {}", msg)),
      FoxBoxError::Nix(errno) => f.write_fmt(format_args!("FoxBox Nix Error: {}", errno)),
      FoxBoxError::Fs(msg) => f.write_fmt(format_args!("FoxBox File System Error: {}", msg)),
      FoxBoxError::Cli(msg) => f.write_fmt(format_args!("FoxBox CLI Error: {}", msg)),
      FoxBoxError::Logger(err) => f.write_fmt(format_args!("FoxBox Logger Error: {}", err)),
    }
  }
}

impl From<Errno> for FoxBoxError {
  fn from(errno: Errno) -> Self {
    FoxBoxError::Nix(errno)
  }
}

impl From<std::io::Error> for FoxBoxError {
  fn from(err: std::io::Error) -> Self {
    FoxBoxError::Fs(err.to_string())
  }
}

impl From<FlexiLoggerError> for FoxBoxError {
  fn from(err: FlexiLoggerError) -> Self {
    FoxBoxError::Logger(err)
  }
}

impl Error for FoxBoxError {}

impl Termination for FoxBoxExit {
  fn report(self) -> ExitCode {
    match self {
      FoxBoxExit::Ok => ExitCode::SUCCESS.report(),
      FoxBoxExit::Err(err) => {
        let text = format!("{}", err);
        let text = match text.split_once(": ") {
          Some((prefix, message)) => {
            let is_tty = isatty(STDOUT_FILENO).unwrap_or(false);
            if is_tty {
              format!("\x1b[1m\x1b[91m{}\x1b[39m\x1b[22m  {}", prefix, message)
            } else {
              format!(
                "{{\n  \"ok\": false,\n  \"type\": \"{}\",\n  \"message\": \"{}\"\n}}",
                prefix, message
              )
            }
          }
          None => {
            format!("{}", err)
          }
        };
        eprintln!("{}", text);
        ExitCode::FAILURE.report()
      }
    }
  }
}
