//! Core math modules.

pub mod dirichlet;
pub mod linalg;
pub mod stable;
pub mod wishart;
