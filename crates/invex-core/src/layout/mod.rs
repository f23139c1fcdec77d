//! Text layout reconstruction.

mod lines;

pub use lines::{Line, LineReconstructor};
