//! Presentation layer: result classification and the recording surface.

pub mod classifier;
pub mod surface;

pub use classifier::{classify, classify_text, render, RenderOutcome, RenderPath, RenderPlan};
pub use surface::{Element, Page, RenderSurface, Section};
