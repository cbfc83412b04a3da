// The infra module contains implementations of core traits.
// Each integration goes in its own submodule.

#[path = "google/mod.rs"]
pub mod google;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "webhook/mod.rs"]
pub mod webhook;

#[cfg(test)]
#[path = "storage/mod.rs"]
pub mod storage;
