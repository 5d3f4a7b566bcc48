//! File and synthetic observation sources.

pub mod clouds;
pub mod init_file;
pub mod synthetic;

pub use clouds::{CloudFrame, CloudSequence, load_cloud_csv};
pub use init_file::{FileInitializationService, load_init_yaml};
pub use synthetic::SyntheticObserver;
