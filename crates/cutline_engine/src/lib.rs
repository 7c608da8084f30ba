pub mod compile;
pub mod concat_list;
pub mod controller;
pub mod error;
pub mod sink;
pub mod supervisor;

pub use compile::{compile, tempo_chain, EngineInvocation};
pub use controller::RunController;
pub use error::{CompileError, LaunchError, RunError};
pub use sink::{ChannelSink, ReportSink, RunEvent};
pub use supervisor::{Canceller, ProcessHandle, ProcessSupervisor, RunOutcome, RunResult};
