//! Per-video quality selection sessions.
//!
//! Resolves a video from a [`VideoCatalog`], loads its chunk-size tables
//! and wires the requested [`Strategy`] into a
//! [`SelectionController`](bitladder_abr::SelectionController).
//!
//! ```rust
//! use bitladder::{SessionBuilder, Strategy, VideoCatalog};
//! use bitladder_abr::{BufferState, SharedBandwidthMeter};
//!
//! let catalog = VideoCatalog::builtin()?;
//! let mut session = SessionBuilder::new(&catalog)
//!     .video("envivio")
//!     .strategy(Strategy::Utility)
//!     .build(SharedBandwidthMeter::new(3_000_000))?;
//!
//! session.select(&BufferState::new(0, 0));
//! assert_eq!(session.selected_index(), 0);
//! # Ok::<(), bitladder::CatalogError>(())
//! ```

#![forbid(unsafe_code)]

mod catalog;
mod chunk_sizes;
mod error;
mod session;

pub use catalog::{VideoCatalog, VideoConfig, VideoEntry};
pub use chunk_sizes::{load_chunk_sizes, parse_chunk_sizes};
pub use error::{CatalogError, CatalogResult};
pub use session::{Session, SessionBuilder, Strategy};
