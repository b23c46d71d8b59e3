pub use checker::{checker_main, invoke_checker, AutoCmp, FileCmp, Scorer};
pub use context::{FoxBoxParams, RunReport};
pub use error::{FoxBoxError, FoxBoxExit};
pub use limits::LimitSet;
pub use sandbox::run;
pub use status::TerminationOutcome;
pub use usage::{collect_children_usage, collect_self_usage, ResourceUsage};

pub mod sio;

mod checker;
mod context;
mod error;
mod limits;
mod sandbox;
mod shared;
mod status;
mod usage;
mod utils;
mod watchdog;
