// src/lib.rs
// newsrag: retrieval-augmented news chat backend

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod session;
pub mod state;

pub use error::{RagError, Result};
pub use state::AppState;
