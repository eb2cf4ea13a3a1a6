//! Output modes for streamed answers.
//!
//! - `terminal`: display surfaces backed by stdout
//! - `prompt`: drives one prompt to completion with Ctrl+C handling

pub mod prompt;
pub mod terminal;
