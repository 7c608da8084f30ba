use cutline_engine::{EngineInvocation, ReportSink, RunOutcome, RunResult};
use std::io::Write;

/// Prints a run to the terminal: the command, the engine's output as it
/// arrives, then a one-line status.
pub struct ConsoleSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

pub fn status_line(result: &RunResult) -> String {
    let secs = result.elapsed().as_secs_f64();
    match result.outcome() {
        RunOutcome::Succeeded => format!("Success ({secs:.1}s)"),
        RunOutcome::Failed { code: Some(code) } => format!("Error: ffmpeg exited with code {code}"),
        RunOutcome::Failed { code: None } => "Error: ffmpeg was terminated by a signal".to_string(),
        RunOutcome::Cancelled => "Cancelled".to_string(),
    }
}

impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    fn invocation(&mut self, invocation: &EngineInvocation) {
        let _ = writeln!(self.out, "Running: {invocation}");
    }

    fn line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    fn finished(&mut self, result: &RunResult) {
        let _ = writeln!(self.out, "{}", status_line(result));
        let _ = self.out.flush();
    }
}
