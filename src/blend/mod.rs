pub mod blend_curve;
pub mod curve_match;
pub use blend_curve::*;
pub use curve_match::*;

#[cfg(test)]
mod tests;
