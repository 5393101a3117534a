pub mod invoker;
pub mod merge_slot;
pub mod records;

pub use invoker::{Invoker, ToolOutput};
pub use merge_slot::{AcquireOutcome, MergeSlot, SlotStatus};
pub use records::{Record, RecordClient};
