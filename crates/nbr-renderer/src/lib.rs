//! Severity classification and rasterization of computed NBR values.

pub mod png;
pub mod rasterize;
pub mod severity;

pub use rasterize::{render_severity, SeverityImage};
pub use severity::{classify, Color, SeverityClass};
