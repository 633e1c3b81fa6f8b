//! Server-side processing queue.
//!
//! A [`QueueEntry`] is created in the `uploaded` state when a transfer
//! completes. An external parser then drives it through [`ProcessingQueue`]:
//! `processing`, then `parsed` or `failed`, and finally `imported`.

pub mod entry;
pub mod memory;
pub mod repository;
pub mod state_machine;

pub use entry::{NewQueueEntry, QueueEntry, QueueEntryPatch, QueueStatus};
pub use memory::MemoryQueueRepository;
pub use repository::{PersistenceError, QueueRepository};
pub use state_machine::{extracted_state_codes, ProcessingQueue, QueueError};
