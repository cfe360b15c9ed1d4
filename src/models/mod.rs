pub mod language;
pub mod problem;

pub use language::Language;
pub use problem::{Problem, Solution};
