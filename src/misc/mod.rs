pub mod binomial;
pub mod floating_point;
pub mod invertible;
pub mod segment;
pub mod trigonometry;

pub use binomial::*;
pub use floating_point::*;
pub use invertible::*;
pub use segment::*;
pub use trigonometry::*;
