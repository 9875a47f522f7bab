/// A cancellation token used to signal pipeline shutdown.
///
/// Pass the token to [`SweepPipeline::new`](crate::SweepPipeline::new) and
/// call [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it to
/// stop discovery after the current page and deletion after the batches
/// already in flight.
pub type PipelineCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PipelineCancellationToken`].
///
/// # Example
///
/// ```
/// use s3unmark_rs::create_pipeline_cancellation_token;
///
/// let token = create_pipeline_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
