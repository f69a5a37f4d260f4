//! Line-indexing core for a large-file log viewer.
//!
//! Scans an append-mostly text file in fixed-size blocks on a background
//! thread, building a compact map from line number to the byte offset one
//! past that line's terminating newline. Along the way it detects the text
//! encoding, tracks the longest line in code points, and fingerprints the
//! file with a bounded-prefix MD5 so later passes can tell appended data
//! from an in-place rewrite.
//!
//! The root module re-exports the types embedders need, so a viewer can be
//! wired up without digging through the module hierarchy:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use logdex::{IndexEvent, IndexingData, LoadingStatus, LogDataWorker};
//!
//! let data = Arc::new(IndexingData::new());
//! let worker = LogDataWorker::new(Arc::clone(&data));
//! worker.attach_file("/var/log/syslog");
//! worker.index_all();
//!
//! while let Some(event) = worker.recv_event() {
//!     match event {
//!         IndexEvent::IndexingProgressed(percent) => eprintln!("{percent}%"),
//!         IndexEvent::IndexingFinished(LoadingStatus::Successful) => break,
//!         _ => break,
//!     }
//! }
//! println!("{} lines indexed", data.get_nb_lines());
//! ```

pub mod config;
pub mod error;
pub mod index;

pub use config::IndexConfig;
pub use error::IndexError;
pub use index::data::{IndexedHash, IndexingData};
pub use index::encoding::{EncodingParameters, TextCodec, detect_encoding};
pub use index::line_position::{FastLinePositionArray, LinePositionArray};
pub use index::worker::{IndexEvent, LogDataWorker};
pub use index::{LoadingStatus, MonitoredFileStatus};
