//! Synthesizer, generator, and validator built on the `doc` crate's
//! statistical profile: turns an inferred schema into a JSON-Schema
//! artifact and synthetic documents, wired together by an async pipeline
//! (§5) and exposed behind a small `clap` CLI (`src/main.rs`).

pub mod artifacts;
pub mod config;
pub mod emit;
pub mod error;
pub mod generate;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod synth;
pub mod validate;

pub use config::Config;
pub use error::{Error, RunReport, Warning};
