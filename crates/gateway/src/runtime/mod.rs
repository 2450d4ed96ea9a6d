pub mod directive;
pub mod prompt;
pub mod turn;
