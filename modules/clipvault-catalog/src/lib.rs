pub mod build;
pub mod captions;
pub mod crawl;
pub mod describe;
pub mod media;
pub mod reconcile;
pub mod walker;
