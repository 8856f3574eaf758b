//! Quiz flow core: the step transition engine, the routes it produces and
//! the fixed question bank.

pub mod engine;
pub mod questions;
pub mod types;


pub use engine::*;
pub use questions::{QUESTIONS, Question};
pub use types::*;
