#![doc = include_str!("../README.md")]

mod cipher;
mod domain;
mod error;
pub mod pipeline;
pub mod render;
mod roster;
mod secrets;
mod service;
mod signer;
pub mod store;
mod time;

pub use crate::cipher::*;
pub use crate::domain::*;
pub use crate::error::*;
pub use crate::pipeline::{
    DEFAULT_RENDER_TIMEOUT, DEFAULT_VALIDITY, DEFAULT_WORKERS, GenerationPipeline,
    GenerationSummary, PipelineConfig,
};
pub use crate::render::{
    CertificateFields, DocumentRenderer, QrImage, RenderRequest, TemplateRenderer,
};
pub use crate::roster::*;
pub use crate::secrets::*;
pub use crate::service::*;
pub use crate::signer::*;
pub use crate::store::{MemoryStore, ParticipantStore, SqliteStore};
pub use crate::time::*;
