//! Conversational code-generation assistant.
//!
//! Collects a model name, its fields and a target folder through a
//! tool-calling dialogue, generates source files from boilerplate examples in
//! one completion call, and lints and repairs each file within an attempt
//! budget.

pub mod adapters;
pub mod contexts;
pub mod data;
pub mod generation_log;
pub mod registries;
pub mod settings;
