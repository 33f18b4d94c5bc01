//! Buffer management substrate for BasaltDB.
//!
//! This crate provides the two data-structure cores the buffer manager
//! builds on:
//! - LRU-K replacement for victim selection in a fixed-size frame pool
//! - An extendible hash table used as the page table, mapping page IDs
//!   to in-memory frame handles
//!
//! Both structures are thread-safe behind a single per-instance mutex.

mod frame;
mod page_table;
mod replacer;

pub use frame::FrameId;
pub use page_table::{ExtendibleHashTable, PageTable};
pub use replacer::{LruKReplacer, Replacer};
