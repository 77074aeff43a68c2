//! Clinically scaled strip rendering.
//!
//! A strip is ECG paper: 1 mm fine grid, 5 mm bold grid, a fixed mm/s and
//! mm/mV scale and a fixed symmetric amplitude window. The signal is cut
//! into equal-duration rows stacked top to bottom. Pixel density comes from
//! the layout's dpi, so distances measured on the PNG at that density match
//! the stated scale.

pub mod layout;
pub mod strip;

pub use layout::StripLayout;
pub use strip::{RenderOutcome, RenderedStrip, StripGeometry, StripRenderer, render};
