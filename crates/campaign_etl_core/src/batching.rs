//! Chunking plan for multi-put submissions to the key-value table.

/// Per-call item ceiling imposed by the store; exceeding it is rejected
/// server-side, so the plan never produces a larger chunk.
pub const MAX_BATCH_PUT_ITEMS: usize = 25;

/// A flush that stopped partway: `written` items were submitted, `pending`
/// items were retained for the caller instead of being discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFlushError<T> {
    pub written: usize,
    pub pending: Vec<T>,
    pub cause: String,
}

impl<T> std::fmt::Display for BatchFlushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch flush stopped after {} items with {} retained: {}",
            self.written,
            self.pending.len(),
            self.cause
        )
    }
}

impl<T: std::fmt::Debug> std::error::Error for BatchFlushError<T> {}

/// Submits `items` in order as chunks of at most [`MAX_BATCH_PUT_ITEMS`],
/// one `submit` call per chunk.
///
/// On a failed submission the unsent tail (the failed chunk and everything
/// after it) comes back in the error rather than being dropped.
pub fn flush_in_batches<T: Clone>(
    items: &[T],
    mut submit: impl FnMut(&[T]) -> Result<(), String>,
) -> Result<usize, BatchFlushError<T>> {
    let mut written = 0;
    for chunk in items.chunks(MAX_BATCH_PUT_ITEMS) {
        if let Err(cause) = submit(chunk) {
            return Err(BatchFlushError {
                written,
                pending: items[written..].to_vec(),
                cause,
            });
        }
        written += chunk.len();
    }
    Ok(written)
}
