//! Transcription factor motif scoring and genome-wide motif occurrence annotation

pub mod bed;
pub mod config;
pub mod error;
pub mod matrix;
pub mod metadata;
pub mod reference;
pub mod scanner;
pub mod scoring;
pub mod sequence;
pub mod types;
