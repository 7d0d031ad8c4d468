//! CaptionFlow media infrastructure adapter.
//!
//! Implements [`pipeline::MediaProbe`] over `ffprobe` and
//! [`pipeline::ContentAnalyzer`] over `ffmpeg`, an optional speech
//! recognition command and an optional frame captioner.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All process spawning and tool output parsing lives
//! here. The [`pipeline`] crate sees only the port traits.

pub mod analyzer;
pub mod command;
pub mod probe;
pub mod scenes;
pub mod tags;
pub mod transcript;

pub use analyzer::{MediaAnalyzer, MediaTools};
pub use command::{ToolCommand, ToolOutput};
pub use probe::FfprobeProbe;
