// Journal module - THE EMITTED LOG
// Structured entries appended by every committed operation

mod entry;

pub use entry::{Journal, LogEntry, TicketEvent};
