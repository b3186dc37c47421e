//! End-to-end scenarios for the save store.
//!
//! Each scenario drives a real store against a temp directory and reopens it
//! with a fresh instance, the way an application restart would.

#[path = "../common/mod.rs"]
mod common;

mod compatibility;
mod durability;
mod lifecycle;
mod migrations;
mod player_state;
