pub mod ai;
pub mod transcript;
