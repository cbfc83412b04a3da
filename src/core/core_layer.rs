// The core module contains the poll cycle and its domain.
// Each concern gets its own submodule.

#[path = "storage/mod.rs"]
pub mod storage;

#[path = "captions/mod.rs"]
pub mod captions;

#[path = "webhook/mod.rs"]
pub mod webhook;

#[path = "engine/mod.rs"]
pub mod engine;
