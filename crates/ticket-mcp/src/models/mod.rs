//! Data models: backend ticket payloads and Deep-Research tool result shapes.

mod results;
mod ticket;

pub use results::{FetchResult, SearchResultItem, SearchResults};
pub use ticket::{HistoryEntry, TicketDetail, TicketDetailPayload, TicketListPayload, TicketSummary};
