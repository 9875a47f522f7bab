use tracing::{debug, info, warn};

use crate::progress::ProgressAccountant;
use crate::storage::Storage;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ListCursor, MarkerRef};

/// Outcome of a discovery run.
///
/// Discovery never fails as a whole: a listing error stops pagination and
/// is returned here together with the markers found before it.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Current delete markers in listing order.
    pub markers: Vec<MarkerRef>,
    /// Pages fetched successfully.
    pub pages: usize,
    pub error: Option<anyhow::Error>,
    pub cancelled: bool,
}

impl Discovery {
    /// True when the listing reached its last page.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

/// Pages through the version listing of the target and collects the
/// current delete markers.
///
/// ## Pipeline role
///
/// ```text
/// MarkerLister → plan_batches → MarkerDeleter (1..N) → summary
/// ```
pub struct MarkerLister {
    target: Storage,
    cancellation_token: PipelineCancellationToken,
}

impl MarkerLister {
    pub fn new(target: Storage, cancellation_token: PipelineCancellationToken) -> Self {
        Self {
            target,
            cancellation_token,
        }
    }

    /// Fetch pages until the listing ends, a page fails or the token is
    /// cancelled. `accountant` is updated with the number of markers found
    /// on each page.
    pub async fn discover(&self, accountant: &mut ProgressAccountant) -> Discovery {
        debug!(phase = "discovery", "delete marker discovery has started.");

        let mut discovery = Discovery::default();
        let mut cursor: Option<ListCursor> = None;

        loop {
            let page_index = discovery.pages;

            if self.cancellation_token.is_cancelled() {
                info!(
                    phase = "discovery",
                    page_index = page_index,
                    "discovery cancelled with {} delete markers found.",
                    discovery.markers.len()
                );
                discovery.cancelled = true;
                return discovery;
            }

            let page = match self.target.list_versions_page(cursor.as_ref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        phase = "discovery",
                        page_index = page_index,
                        error = format!("{e:#}"),
                        "version listing failed. discovery stopped with {} delete markers found.",
                        discovery.markers.len()
                    );
                    discovery.error = Some(e);
                    return discovery;
                }
            };

            let found = page.markers.len();
            debug!(
                phase = "discovery",
                page_index = page_index,
                scanned = page.scanned,
                found = found,
                truncated = page.is_truncated(),
                "version listing page processed."
            );

            discovery.markers.extend(page.markers);
            discovery.pages += 1;
            accountant.update(found as u64, 0);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            phase = "discovery",
            pages = discovery.pages,
            found = discovery.markers.len(),
            "delete marker discovery has been completed."
        );
        discovery
    }
}
