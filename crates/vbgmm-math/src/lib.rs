//! Numerical primitives for variational Gaussian mixture inference.

pub mod math;

pub use math::dirichlet::DirichletParams;
pub use math::linalg::{LinalgError, SpdFactor};
pub use math::stable::*;
pub use math::wishart::WishartParams;
