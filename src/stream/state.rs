use std::ops::{Deref, DerefMut};
use std::sync::LazyLock;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::protocol::mapping::FinishReason;
use crate::util::{generate_id, unix_now_secs};

/// Default number of idle states kept by a pool.
pub const DEFAULT_POOL_MAX_IDLE: usize = 64;

/// What an open output item carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Text,
    Tool {
        call_id: String,
        name: String,
        arguments: String,
    },
    Reasoning,
}

/// One output item of the unified stream, addressed by its output index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSlot {
    /// Vendor content block index that opened the item.
    pub content_index: usize,
    pub item_id: String,
    pub kind: SlotKind,
    pub completed: bool,
}

impl OutputSlot {
    #[must_use]
    pub fn is_reasoning(&self) -> bool {
        matches!(self.kind, SlotKind::Reasoning)
    }

    #[must_use]
    pub fn is_tool(&self) -> bool {
        matches!(self.kind, SlotKind::Tool { .. })
    }
}

/// Per-stream translation state.
///
/// Output indices are positions in `slots`, so the next index is the slot count
/// and closing in slot order is deterministic.
#[derive(Debug, Default)]
pub struct StreamState {
    message_id: Option<String>,
    model: Option<String>,
    stop_reason: Option<FinishReason>,
    created_at: u64,
    pub(crate) created_emitted: bool,
    pub(crate) in_progress_emitted: bool,
    slots: Vec<OutputSlot>,
    content_to_output: FxHashMap<usize, usize>,
    open_reasoning: FxHashSet<usize>,
}

impl StreamState {
    #[must_use]
    pub fn new(model: Option<String>) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Return the state to its freshly constructed form, keeping allocations.
    pub fn reset(&mut self) {
        self.message_id = None;
        self.model = None;
        self.stop_reason = None;
        self.created_at = 0;
        self.created_emitted = false;
        self.in_progress_emitted = false;
        self.slots.clear();
        self.content_to_output.clear();
        self.open_reasoning.clear();
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Assign the message id and creation time on first use.
    pub fn ensure_message_id(&mut self) -> &str {
        if self.created_at == 0 {
            self.created_at = unix_now_secs();
        }
        self.message_id.get_or_insert_with(|| generate_id("msg"))
    }

    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    #[must_use]
    pub fn stop_reason(&self) -> Option<FinishReason> {
        self.stop_reason
    }

    pub fn set_stop_reason(&mut self, reason: FinishReason) {
        self.stop_reason = Some(reason);
    }

    #[must_use]
    pub fn next_output_index(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn output_index_for(&self, content_index: usize) -> Option<usize> {
        self.content_to_output.get(&content_index).copied()
    }

    #[must_use]
    pub fn slots(&self) -> &[OutputSlot] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, output_index: usize) -> Option<&OutputSlot> {
        self.slots.get(output_index)
    }

    pub(crate) fn slot_mut(&mut self, output_index: usize) -> Option<&mut OutputSlot> {
        self.slots.get_mut(output_index)
    }

    /// Open a new output item for `content_index` and return its output index.
    pub fn allocate(&mut self, content_index: usize, item_id: String, kind: SlotKind) -> usize {
        let output_index = self.slots.len();
        if matches!(kind, SlotKind::Reasoning) {
            self.open_reasoning.insert(content_index);
        }
        self.slots.push(OutputSlot {
            content_index,
            item_id,
            kind,
            completed: false,
        });
        self.content_to_output.insert(content_index, output_index);
        output_index
    }

    /// Mark a slot completed. Returns `false` if it was already closed or unknown.
    pub(crate) fn complete(&mut self, output_index: usize) -> bool {
        let Some(slot) = self.slots.get_mut(output_index) else {
            return false;
        };
        if slot.completed {
            return false;
        }
        slot.completed = true;
        if slot.is_reasoning() {
            self.open_reasoning.remove(&slot.content_index);
        }
        true
    }

    /// Content indices of reasoning blocks that are still open, ascending.
    #[must_use]
    pub fn open_reasoning_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.open_reasoning.iter().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Whether any tool call has been opened in this stream.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.slots.iter().any(OutputSlot::is_tool)
    }

    /// Synthesized id for an item of `kind` (`item` or `reasoning`) at `output_index`.
    pub(crate) fn synthesize_item_id(&self, kind: &str, output_index: usize) -> String {
        match &self.message_id {
            Some(message_id) => format!("{message_id}_{kind}_{output_index}"),
            None => format!("{kind}_{output_index}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

static GLOBAL_POOL: LazyLock<StreamStatePool> =
    LazyLock::new(|| StreamStatePool::new(DEFAULT_POOL_MAX_IDLE));

/// A free list of reusable stream states.
#[derive(Debug)]
pub struct StreamStatePool {
    idle: Mutex<Vec<StreamState>>,
    max_idle: usize,
}

impl StreamStatePool {
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// The process-wide pool.
    #[must_use]
    pub fn global() -> &'static StreamStatePool {
        &GLOBAL_POOL
    }

    /// Take a reset state from the pool, or build a fresh one.
    #[must_use]
    pub fn acquire(&self) -> PooledStreamState<'_> {
        let mut state = self.idle.lock().pop().unwrap_or_default();
        state.reset();
        PooledStreamState { pool: self, state }
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut state: StreamState) {
        state.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(state);
        }
    }
}

/// A state borrowed from a [`StreamStatePool`]; returned, reset, on drop.
#[derive(Debug)]
pub struct PooledStreamState<'a> {
    pool: &'a StreamStatePool,
    state: StreamState,
}

impl Deref for PooledStreamState<'_> {
    type Target = StreamState;

    fn deref(&self) -> &StreamState {
        &self.state
    }
}

impl DerefMut for PooledStreamState<'_> {
    fn deref_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }
}

impl Drop for PooledStreamState<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.state));
    }
}
