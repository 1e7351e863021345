/// Host module contains implementations of core traits
/// on top of real host processes: the docker CLI for production
/// and plain child processes underneath it.
pub mod docker;
pub mod process;
