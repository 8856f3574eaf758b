pub mod model;
pub mod persistence;
pub mod recovery;

#[cfg(test)]
mod tests;

pub use model::*;
pub use persistence::*;
pub use recovery::*;
