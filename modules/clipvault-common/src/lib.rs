pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::ClipVaultError;
pub use store::{data_dir, ProfileStore};
pub use types::{
    Caption, DatasetCounts, ProfileIndex, Transcript, UnifiedDataset, VideoRecord,
};
