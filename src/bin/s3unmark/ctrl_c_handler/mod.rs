// Cancels the sweep on Ctrl+C. Batches already taken by a worker are
// finished; discovery stops before the next page.

use s3unmark_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("sweep cancellation token cancelled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received. finishing the batches in flight, then stopping.");
                cancellation_token.cancel();
            }
        }
    })
}
