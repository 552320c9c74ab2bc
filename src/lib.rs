//! # Recall Harness
//!
//! A document comprehension service: upload a PDF, get questions about it,
//! answer them (typed or spoken), and get an understanding score back.
//!
//! The pipeline extracts text from uploads, stores the original file in
//! object storage, embeds the text into one document-level vector, and
//! generates comprehension questions with a generative model. Answers are
//! embedded the same way and scored against the document vector by cosine
//! similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │  Upload  │──▶│   Workflow     │──▶│  SQLite   │
//! │  (PDF)   │   │ extract+embed │   │  + S3     │
//! └──────────┘   │ +generate     │   └────┬─────┘
//!                └───────────────┘        │
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                 ┌──────────┐      ┌──────────┐
//!                 │   CLI    │      │   HTTP   │
//!                 │ (recall) │      │  (axum)  │
//!                 └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                        # create database
//! recall ingest paper.pdf            # upload, embed, generate questions
//! recall questions <document-id>     # follow-up questions
//! recall answer <document-id> --user alice "my answer"
//! recall serve                       # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Paragraph-boundary text chunking |
//! | [`embedding`] | Embedding providers and document aggregation |
//! | [`score`] | Cosine-similarity understanding scoring |
//! | [`question_gen`] | Question generation providers and prompts |
//! | [`extract`] | PDF text extraction |
//! | [`storage`] | Object storage (S3 SigV4) |
//! | [`transcribe`] | Speech-to-text for spoken answers |
//! | [`store`] | Knowledge store (SQLite + in-memory) |
//! | [`workflow`] | Workflow controller |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod question_gen;
pub mod score;
pub mod server;
pub mod storage;
pub mod store;
pub mod transcribe;
pub mod workflow;
