//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check and fallback
//! - `characters` - Character listing and voice reassignment
//! - `languages` - Supported language listing
//! - `tts` - Audio generation (single, file, batch, streamed)
//! - `voices` - Voice listing

pub mod api;
pub mod characters;
pub mod languages;
pub mod tts;
pub mod voices;
