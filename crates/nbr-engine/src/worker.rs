//! Background execution of the band-math kernel.
//!
//! The kernel runs on the blocking pool and talks to the coordinator through
//! an explicit request/response message pair, so the interactive path never
//! stalls on a multi-megapixel loop. The coordinator owns at most one worker
//! handle at a time; starting a new computation replaces it, and messages
//! from a replaced worker are simply never applied.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::band_math::{compute_nbr, NbrGrid};

/// Input message for one band-math run.
#[derive(Debug)]
pub struct WorkerRequest {
    pub nir_data: Vec<f32>,
    pub swir_data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub no_data_value: f32,
}

/// Output messages from a band-math run.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Percentage of pixels completed.
    Progress { percent: u8 },
    /// The finished grid; final message of a run.
    Complete { grid: NbrGrid },
}

/// Handle to a spawned band-math worker.
pub struct WorkerHandle {
    pub messages: mpsc::UnboundedReceiver<WorkerMessage>,
    pub join: JoinHandle<()>,
}

/// Spawn the band-math kernel for `request` on the blocking pool.
///
/// Progress messages arrive as the pixel loop advances; the `Complete`
/// message closes the channel. If the receiver is dropped, the kernel keeps
/// running to completion but its messages go nowhere.
pub fn spawn_band_math(request: WorkerRequest) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let join = tokio::task::spawn_blocking(move || {
        debug!(
            width = request.width,
            height = request.height,
            "band-math worker started"
        );

        let progress_tx = tx.clone();
        let grid = compute_nbr(
            &request.nir_data,
            &request.swir_data,
            request.width,
            request.height,
            request.no_data_value,
            move |percent| {
                let _ = progress_tx.send(WorkerMessage::Progress { percent });
            },
        );

        let _ = tx.send(WorkerMessage::Complete { grid });
    });

    WorkerHandle { messages: rx, join }
}
