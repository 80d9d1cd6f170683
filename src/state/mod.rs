/// State management module
///
/// This module handles everything the history vault keeps, including:
/// - Shared data structures (data.rs)
/// - Tier budgets and eviction (quota.rs)
/// - The bounded history store (history.rs)
/// - The key-value persistence port (storage.rs) and its SQLite catalog (library.rs)

pub mod data;
pub mod history;
pub mod library;
pub mod quota;
pub mod storage;
