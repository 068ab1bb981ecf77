//! Room Registry の実装

pub mod inmemory;

pub use inmemory::InMemoryRoomRegistry;
