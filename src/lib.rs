//! Purpose: Shared library crate used by the `mediconv` CLI, HTTP service and tests.
//! Exports: `api` (stable conversion surface), `core` (reader, dictionary, decoder, converters).
//! Role: Library backing the binary; `api` is the supported entry point.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: The only process-wide state is the shared key cache.
pub mod api;
pub mod core;
