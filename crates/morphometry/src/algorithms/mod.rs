pub mod extraction;
pub mod normalize;
pub mod geometry;
pub mod ellipse;
pub mod feret;
pub mod descriptors;

pub use extraction::*;
pub use normalize::*;
pub use ellipse::*;
pub use feret::*;
pub use descriptors::*;
