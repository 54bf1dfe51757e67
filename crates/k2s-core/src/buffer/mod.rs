//! Window buffer and flush policy.
//!
//! The buffer accumulates decoded records for the current window and decides
//! on every insertion whether the window must be flushed, by size first and
//! by age second.

mod policy;
mod window;

pub use policy::{FlushPolicy, FlushTrigger};
pub use window::{WindowBuffer, WindowStats};
