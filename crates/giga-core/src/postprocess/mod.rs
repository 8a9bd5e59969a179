//! Post-processing: turning the raw mission file into the final container.
//!
//! The algorithm is chosen once, at mission creation, as a closed
//! [`Algorithm`] variant. Remuxing goes through the [`RemuxTool`] seam so the
//! engine only depends on "run these arguments, get an exit status".

mod direct;
mod handlers;
mod spec;
mod tool;

pub use direct::{fetch_direct, HlsInput};
pub use handlers::{run, PostProcessError, RawLayout};
pub use spec::{Algorithm, Container, PostProcessingSpec};
pub use tool::{FfmpegTool, RemuxTool};
