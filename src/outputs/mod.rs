//! Record files written next to retrieved content.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed, whole-file JSON writer
//! - [`submission`]: the fixed `submission.json` record
//! - [`comments`]: breadth-first comment flattening and `comments.json`
//!
//! # Output Structure
//!
//! ```text
//! <root>/www.reddit.com/r/<subreddit>/<category>/
//! └── 000_<sanitized title>/
//!     ├── files/            # retrieved media
//!     ├── submission.json
//!     └── comments.json
//! ```

pub mod comments;
pub mod json;
pub mod submission;
