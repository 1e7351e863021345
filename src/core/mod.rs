pub mod capture;
pub mod domain;
pub mod report;
pub mod sandbox;
pub mod supervisor;
pub mod traits;
