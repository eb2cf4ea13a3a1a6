//! Display/state integration: request lifecycle, cancel-then-restart, surfaces.

pub mod controller;
pub mod session;
pub mod surface;

pub use controller::{ControllerOptions, PromptController, PromptSource};
pub use session::{RequestState, ResponseBuffer, StreamOutcome, StreamSession};
pub use surface::{DisplaySurface, MemorySurface};
