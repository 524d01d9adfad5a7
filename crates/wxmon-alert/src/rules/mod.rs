pub mod condition;
pub mod threshold;
