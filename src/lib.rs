//! # ARC Bot backend utilities
//!
//! Backend tooling for ARC Bot, a retrieval-augmented Q&A assistant for
//! municipal development code. The crate covers the path between the
//! upstream language-model agent and the chat frontend, plus the one-time
//! tooling that seeds the hosted knowledge base:
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │  LM agent  │──▶│  Normalizer   │──▶│  Frontend │
//! │ raw output │   │ parse+merge  │   │  payload  │
//! └────────────┘   └──────────────┘   └───────────┘
//!
//! ┌───────────┐   ┌─────────────┐   ┌────────────┐
//! │ code text │──▶│ Chunk+Embed  │──▶│  Supabase  │
//! └───────────┘   └─────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! arcbot normalize reply.txt --session-id s1 --history-count 3
//! arcbot migrate                # allow the city_code document type
//! arcbot upload code.txt        # chunk, embed, and insert
//! arcbot serve                  # HTTP API for the frontend
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Agent output → structured response |
//! | [`requirements`] | Heuristic requirement extraction |
//! | [`chunk`] | Municipal-code section chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`supabase`] | PostgREST client |
//! | [`upload`] | Chunk/embed/insert pipeline |
//! | [`migrate`] | Document-type schema migration |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod requirements;
pub mod server;
pub mod supabase;
pub mod upload;
