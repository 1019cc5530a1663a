//! Evaluator service — grades a published submission.
//!
//! ## Module Map
//!
//! ```text
//! POST /notify ──> api.rs ──> pipeline.rs (Evaluator::evaluate)
//!                               │
//!                               ├─ fetch.rs    clone into a temp dir (fatal on error)
//!                               ├─ checks.rs   LICENSE / README.md / index.html / code files
//!                               ├─ review.rs   model feedback on the README
//!                               ├─ browser.rs  headless Chromium probe of pages_url
//!                               └─ db.rs       append-only SQLite row
//! GET /results ──> api.rs ──> db.rs (newest first)
//! ```
//!
//! Review and browser failures become structured entries in the results;
//! the row is written either way.

pub mod api;
pub mod browser;
pub mod checks;
pub mod db;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod review;
