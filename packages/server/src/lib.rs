//! Real-time messaging and presence server for the Kakehashi project
//! workspace.
//!
//! One WebSocket room per project: a freelancer and their client exchange
//! messages, typing indicators, read receipts, and presence. Durable
//! message state lives behind the `MessageStore` seam; identity checks
//! live behind the `IdentityValidator` seam.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
