//! Configuration options for batchdb.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::merge::MergeOperator;
use crate::metrics::ApplyMetrics;

/// Default write buffer size before a flush is signalled (64MB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Outcome of an in-place update callback.
#[derive(Debug, Clone)]
pub enum UpdateStatus {
    /// The callback rejected the update; the record is dropped.
    Failed,
    /// The existing buffer was rewritten; the payload is the final value.
    UpdatedInplace(Bytes),
    /// A new merged value was produced; the payload is the final value.
    Updated(Bytes),
}

/// User callback combining an existing value with an incoming delta.
///
/// Receives the previous value (None when the key is absent) and the delta
/// from the write, and decides how the update lands.
pub type InplaceCallback = Arc<dyn Fn(Option<&[u8]>, &[u8]) -> UpdateStatus + Send + Sync>;

/// Per-column-family memory-table configuration.
#[derive(Clone)]
pub struct MemTableOptions {
    /// Memory-table size at which a flush should be scheduled.
    pub write_buffer_size: usize,

    /// Overwrite the newest value version in place instead of appending.
    pub inplace_update_support: bool,

    /// User callback driving in-place updates. Requires
    /// `inplace_update_support`.
    pub inplace_callback: Option<InplaceCallback>,

    /// Pre-check deletes against storage and drop those that cannot match.
    pub filter_deletes: bool,

    /// Fold merge operands into a value once this many consecutive merge
    /// entries are buffered for a key (0 disables folding).
    pub max_successive_merges: usize,

    /// User merge operator. Required when `max_successive_merges > 0`.
    pub merge_operator: Option<Arc<dyn MergeOperator>>,

    /// Statistics sink for the applier.
    pub metrics: Option<Arc<ApplyMetrics>>,
}

impl fmt::Debug for MemTableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTableOptions")
            .field("write_buffer_size", &self.write_buffer_size)
            .field("inplace_update_support", &self.inplace_update_support)
            .field("inplace_callback", &self.inplace_callback.is_some())
            .field("filter_deletes", &self.filter_deletes)
            .field("max_successive_merges", &self.max_successive_merges)
            .field(
                "merge_operator",
                &self.merge_operator.as_ref().map(|op| op.name().to_string()),
            )
            .finish()
    }
}

impl Default for MemTableOptions {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            inplace_update_support: false,
            inplace_callback: None,
            filter_deletes: false,
            max_successive_merges: 0,
            merge_operator: None,
            metrics: None,
        }
    }
}

impl MemTableOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.write_buffer_size < 1024 {
            return Err(crate::Error::InvalidConfiguration(
                "write_buffer_size must be at least 1KB".into(),
            ));
        }

        if self.inplace_callback.is_some() && !self.inplace_update_support {
            return Err(crate::Error::InvalidConfiguration(
                "inplace_callback requires inplace_update_support".into(),
            ));
        }

        if self.inplace_update_support && self.merge_operator.is_some() {
            return Err(crate::Error::InvalidConfiguration(
                "inplace_update_support is incompatible with a merge operator".into(),
            ));
        }

        if self.max_successive_merges > 0 && self.merge_operator.is_none() {
            return Err(crate::Error::InvalidConfiguration(
                "max_successive_merges requires a merge operator".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for MemTableOptions.
#[derive(Clone, Default)]
pub struct MemTableOptionsBuilder {
    options: MemTableOptions,
}

impl MemTableOptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            options: MemTableOptions::new(),
        }
    }

    /// Set the write buffer size.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.options.write_buffer_size = size;
        self
    }

    /// Enable in-place updates, optionally with a user callback.
    pub fn inplace_update(mut self, callback: Option<InplaceCallback>) -> Self {
        self.options.inplace_update_support = true;
        self.options.inplace_callback = callback;
        self
    }

    /// Enable delete filtering.
    pub fn filter_deletes(mut self, value: bool) -> Self {
        self.options.filter_deletes = value;
        self
    }

    /// Set the merge operator and fold threshold.
    pub fn merge_operator(
        mut self,
        operator: Arc<dyn MergeOperator>,
        max_successive_merges: usize,
    ) -> Self {
        self.options.merge_operator = Some(operator);
        self.options.max_successive_merges = max_successive_merges;
        self
    }

    /// Set the statistics sink.
    pub fn metrics(mut self, metrics: Arc<ApplyMetrics>) -> Self {
        self.options.metrics = Some(metrics);
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<MemTableOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
