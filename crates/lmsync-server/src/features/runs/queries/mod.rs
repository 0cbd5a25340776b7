//! Run feature queries

pub mod get_status;
pub mod list_history;

pub use get_status::GetStatusQuery;
pub use list_history::ListHistoryQuery;
