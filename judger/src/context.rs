use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use judge_core::judge::StopSignal;

use crate::error::JudgerError;

/// Flags shared between the host and the judge worker.
///
/// `judging` is true while a batch is active; `stop` asks the active batch to
/// end at the next cell boundary.
#[derive(Debug, Default)]
pub struct JudgeContext {
    judging: AtomicBool,
    stop: StopSignal,
}

impl JudgeContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_judging(&self) -> bool {
        self.judging.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        log::info!("Stop requested");
        self.stop.request();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Handle to the stop flag, handed to every judger of the batch
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Marks a batch as active. Fails when another batch already is.
    pub fn begin_batch(self: &Arc<Self>) -> Result<BatchGuard, JudgerError> {
        self.judging
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| JudgerError::BatchAlreadyRunning)?;
        self.stop.reset();
        Ok(BatchGuard {
            context: Arc::clone(self),
        })
    }
}

/// Clears the judging flag when dropped, also on unwinding.
#[derive(Debug)]
pub struct BatchGuard {
    context: Arc<JudgeContext>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.context.judging.store(false, Ordering::SeqCst);
    }
}
