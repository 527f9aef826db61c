//! Document ingestion and multi-modal retrieval backend.
//!
//! Ingests documents as overlapping text chunks and linked page images with
//! per-chunk embeddings, ranks chunks against query embeddings (vector
//! index when available, exact full scan otherwise), and assembles ranked
//! context plus structured answer sections for an external answer model.

pub mod config;
pub mod core;
pub mod embedding;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
