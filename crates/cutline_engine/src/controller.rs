use crate::compile::compile;
use crate::concat_list::ConcatList;
use crate::error::{Result, RunError};
use crate::sink::ReportSink;
use crate::supervisor::{Canceller, ProcessSupervisor, RunResult};
use cutline_core::{FormFields, Mode, OperationSpec};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    /// Claimed, engine not started yet.
    Starting { cancel_requested: bool },
    Running(Canceller),
}

/// Turns run requests into supervised engine runs, one at a time.
///
/// Clones share the same run slot, so one clone can cancel a run another
/// clone is driving.
#[derive(Debug, Clone)]
pub struct RunController {
    supervisor: ProcessSupervisor,
    slot: Arc<Mutex<Slot>>,
}

impl RunController {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            supervisor,
            slot: Arc::new(Mutex::new(Slot::Idle)),
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(*self.lock_slot(), Slot::Idle)
    }

    /// Cancel the active run, if there is one.
    pub fn cancel(&self) {
        match &mut *self.lock_slot() {
            Slot::Idle => {}
            Slot::Starting { cancel_requested } => *cancel_requested = true,
            Slot::Running(canceller) => canceller.cancel(),
        }
    }

    /// Run `mode` with the raw values an input surface collected.
    pub async fn run(
        &self,
        mode: Mode,
        fields: &FormFields,
        sink: &mut dyn ReportSink,
    ) -> Result<RunResult> {
        let input = fields.input_path().ok_or(RunError::MissingPath("input"))?;
        let output = fields.output_path().ok_or(RunError::MissingPath("output"))?;
        let spec = fields.to_spec(mode)?;
        self.run_spec(spec, &input, &output, sink).await
    }

    /// Run an already-built operation.
    ///
    /// Fails with [`RunError::Busy`] while another run is active; compile and
    /// launch errors are returned before any output is reported.
    pub async fn run_spec(
        &self,
        spec: OperationSpec,
        input: &Path,
        output: &Path,
        sink: &mut dyn ReportSink,
    ) -> Result<RunResult> {
        let guard = self.claim()?;
        let span = tracing::info_span!("run", id = %Uuid::new_v4(), mode = %spec.mode());
        self.execute(guard, spec, input, output, sink)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        guard: SlotGuard<'_>,
        spec: OperationSpec,
        input: &Path,
        output: &Path,
        sink: &mut dyn ReportSink,
    ) -> Result<RunResult> {
        // Held until the end of the run so the engine can still read it.
        let list = match spec.second_input() {
            Some(second) if spec.needs_list_file() && !second.as_os_str().is_empty() => {
                Some(ConcatList::write(input, second)?)
            }
            _ => None,
        };
        let spec = match &list {
            Some(list) => spec.with_list_file(list.path()),
            None => spec,
        };

        let invocation = compile(&spec, input, output, self.supervisor.engine())?;
        tracing::debug!(%invocation, "compiled");
        sink.invocation(&invocation);

        let mut handle = self.supervisor.launch(&invocation)?;
        guard.running(handle.canceller());

        while let Some(line) = handle.next_line().await {
            sink.line(&line);
        }
        let result = handle.wait().await;
        sink.finished(&result);

        if result.success() {
            tracing::info!("run succeeded");
        } else if result.is_cancelled() {
            tracing::info!("run cancelled");
        } else {
            tracing::warn!(code = ?result.exit_code(), "run failed");
        }
        Ok(result)
    }

    fn claim(&self) -> Result<SlotGuard<'_>> {
        let mut slot = self.lock_slot();
        if !matches!(*slot, Slot::Idle) {
            return Err(RunError::Busy);
        }
        *slot = Slot::Starting {
            cancel_requested: false,
        };
        Ok(SlotGuard { slot: &self.slot })
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // The slot holds no invariants a panicking holder could break.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Frees the run slot when the run ends, however it ends.
struct SlotGuard<'a> {
    slot: &'a Mutex<Slot>,
}

impl SlotGuard<'_> {
    fn running(&self, canceller: Canceller) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Slot::Starting {
            cancel_requested: true,
        } = *slot
        {
            canceller.cancel();
        }
        *slot = Slot::Running(canceller);
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Slot::Idle;
    }
}
