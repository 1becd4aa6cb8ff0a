//! # Pubsub Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Bus builders, recording subscribers and provider
//! └── integration/
//!     ├── routing.rs    # External routing, privacy, file-based ACL
//!     ├── hot_swap.rs   # Provider load/unload/reload under a running bus
//!     ├── cluster.rs    # Several instances on one broker link
//!     └── realtime.rs   # WebSocket clients against a full node
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pubsub-tests
//! cargo test -p pubsub-tests integration::realtime::
//! ```

pub mod fixtures;
pub mod integration;
