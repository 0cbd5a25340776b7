//! Events feature queries

pub mod page_events;

pub use page_events::PageEventsQuery;
