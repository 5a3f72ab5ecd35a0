//! Look-ahead image preloading.

mod loader;
mod plan;
mod state;

pub use loader::{ImagePreloader, RetryPolicy};
pub use plan::plan_look_ahead;
pub use state::LoadState;
