pub mod config;
pub mod under_file_system;

pub use config::UfsConfig;
pub use under_file_system::{Ufs, UfsEntry, UfsOperations};
