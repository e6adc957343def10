//! Service layer: URL checks, progress tracking, extraction engine,
//! tagging and the pipeline that ties them together

pub mod download_pipeline;
pub mod engine;
pub mod metadata_enhancer;
pub mod progress_store;
pub mod url_validator;

pub use download_pipeline::DownloadPipeline;
pub use engine::{MediaEngine, YtDlpEngine};
pub use metadata_enhancer::MetadataEnhancer;
pub use progress_store::{JobRegistry, ProgressStore, RegistryError};
