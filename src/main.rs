use std::env;

use clap::{Parser, Subcommand};
use flexi_logger::{DeferredNow, Duplicate, FileSpec, Logger};
use log::{info, Record};

use foxj::{invoke_checker, run, FileCmp, FoxBoxError, FoxBoxExit, FoxBoxParams};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[arg(short, long, default_value_t = 1, help = "CPU time limit in seconds")]
  time: u64,

  #[arg(short, long, default_value_t = 1 << 30, help = "Address space limit in bytes")]
  memory: u64,

  #[arg(long, default_value_t = 256 * 1024 * 1024, help = "Output file size limit in bytes")]
  fsize: u64,

  #[arg(long, default_value_t = 100, help = "Open file descriptor limit")]
  nofile: u64,

  #[arg(long, help = "Watchdog wall clock limit in seconds")]
  watchdog: Option<u32>,

  #[arg(long, help = "Redirect stdin from file")]
  stdin: Option<String>,

  #[arg(long, help = "Redirect stdout to file")]
  stdout: Option<String>,

  #[arg(long, help = "Redirect stderr to file")]
  stderr: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  #[command(about = "Run user program under resource limits")]
  Run {
    #[arg(help = "Program")]
    program: String,

    #[arg(help = "Arguments")]
    arguments: Vec<String>,
  },

  #[command(about = "Score a result directory with the builtin checker")]
  Check {
    #[arg(help = "Result directory")]
    dir: String,
  },
}

impl Cli {
  fn resolve(self) -> FoxBoxParams {
    let (program, arguments) = match self.command {
      Commands::Run { program, arguments } => (program, arguments),
      Commands::Check { .. } => unreachable!(),
    };

    let mut params = FoxBoxParams::new(program, arguments);
    params
      .cpu_limit(self.time, self.time + 1)
      .memory_limit(self.memory)
      .file_size_limit(self.fsize)
      .open_files_limit(self.nofile)
      .stdin(self.stdin)
      .stdout(self.stdout)
      .stderr(self.stderr);
    if let Some(seconds) = self.watchdog {
      params.watchdog(seconds);
    }
    params
  }
}

/// A logline-formatter that produces log lines like <br>
/// ```[datetime: INFO] Start monitoring child process```
pub fn default_format(
  w: &mut dyn std::io::Write,
  now: &mut DeferredNow,
  record: &Record,
) -> Result<(), std::io::Error> {
  write!(
    w,
    "[{}: {:5}] {}",
    now.format("%Y-%m-%d %H:%M:%S"),
    record.level(),
    record.args()
  )
}

fn judge(cli: Cli) -> Result<(), FoxBoxError> {
  let _logger = Logger::try_with_str("foxj=info")?
    .log_to_file(
      FileSpec::default()
        .directory(env::var("LOG_DIR").unwrap_or("./logs/".into()))
        .basename("foxj")
        .discriminant(format!("{}", chrono::offset::Local::now().format("%Y-%m-%d")))
        .suppress_timestamp(),
    )
    .append()
    .duplicate_to_stderr(Duplicate::Warn)
    .format_for_files(default_format)
    .start()?;

  info!("Start running foxj");

  let params = cli.resolve();
  let report = run(&params)?;
  println!("{}", report);

  info!("Running foxj finished");

  Ok(())
}

fn main() -> FoxBoxExit {
  let cli = Cli::parse();

  // Check 子命令只输出分数或者诊断，不开日志
  if let Commands::Check { dir } = &cli.command {
    invoke_checker(&FileCmp, dir);
  }

  match judge(cli) {
    Ok(_) => FoxBoxExit::Ok,
    Err(err) => FoxBoxExit::Err(err),
  }
}
