// src/props/streaming/mod.rs
//! Distance-driven chunk load/unload around the viewer.

pub mod streamer;

pub use streamer::{ActiveChunk, ChunkStreamer, StreamFrame, StreamReport};
