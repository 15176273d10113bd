//! [`HistorySource`](crate::traits::HistorySource) implementations.

mod history_server;

pub use history_server::HistoryServerSource;
