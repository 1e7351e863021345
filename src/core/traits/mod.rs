pub mod launcher;
pub mod runner;
