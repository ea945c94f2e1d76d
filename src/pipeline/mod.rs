//! Pipeline stages for contract risk analysis.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the model client can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompts ──▶ llm ──▶ parse ──▶ classify
//! (path/URL) (lopdf)    (budget)   (retry)  (score)   (tier)
//! ```
//!
//! 1. [`input`]    — read the local file or download the URL into memory
//! 2. [`extract`]  — page text in page order; runs in `spawn_blocking`
//! 3. [`crate::prompts`] — truncate to the character budget and build the prompt
//! 4. [`llm`]      — the only stage with network I/O; retry with backoff
//! 5. [`parse`]    — score line and summary out of free text; never fails
//! 6. [`classify`] — score to LOW / MODERATE / HIGH
//!
//! [`control`] carries cancellation and the run deadline through every
//! await point.

pub mod classify;
pub mod control;
pub mod extract;
pub mod input;
pub mod llm;
pub mod parse;
