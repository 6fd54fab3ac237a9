//! Tonearm Core
//!
//! Shared media model and collaborator contracts for Tonearm.
//!
//! This crate provides the building blocks every other Tonearm crate agrees on:
//! - **Media Types**: `MediaItem` (a `Track` or a `RadioStation`) and its
//!   read-only `MediaItemMetadata` view
//! - **Library Provider**: the `LibraryProvider` trait implemented by each
//!   music-server protocol adapter
//! - **Error Handling**: `ProviderError` and its `Result` alias
//!
//! # Example
//!
//! ```rust
//! use tonearm_core::{MediaItem, RadioStation, Track};
//! use std::time::Duration;
//!
//! let track = Track::new("tr-1", "Blue in Green", Duration::from_secs(337));
//! let station = RadioStation::new("rs-1", "Jazz FM", "https://stream.example/jazz");
//!
//! let queue = vec![MediaItem::from(track), MediaItem::from(station)];
//! assert!(queue[1].is_radio());
//! assert_eq!(queue[0].metadata().duration, Duration::from_secs(337));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ProviderError, Result};
pub use traits::LibraryProvider;
pub use types::{MediaItem, MediaItemKind, MediaItemMetadata, RadioStation, Track};
