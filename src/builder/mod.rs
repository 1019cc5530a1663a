//! Build service — turns an instructor brief into a published static app.
//!
//! ## Module Map
//!
//! ```text
//! ┌────────────┐  POST /  ┌────────────────────────────────────────────────┐
//! │ Instructor │ ───────> │  api.rs  (secret gate, task-name check)        │
//! │   client   │ <─────── │         │                                      │
//! └────────────┘ response │         │ RequestOrchestrator::handle()        │
//!                         │         v                                      │
//!                         │  orchestrator.rs  (dispatch on round)          │
//!                         │     │                │               │         │
//!                         │     v                v               v         │
//!                         │  generator.rs     sync.rs        notifier.rs   │
//!                         │  (brief → files)  (create/revise (backoff,     │
//!                         │                    via github.rs) spawned)     │
//!                         └────────────────────────────────────────────────┘
//! ```
//!
//! | Module         | Responsibility                                          |
//! |----------------|---------------------------------------------------------|
//! | `models`       | `BuildRequest`, `Round`, `CodeArtifactSet`, payloads    |
//! | `generator`    | Prompting, balanced-JSON extraction, artifact parsing   |
//! | `github`       | `RepositoryHost` trait + GitHub REST client             |
//! | `sync`         | `RepositorySync` — per-file create/update, Pages        |
//! | `notifier`     | `NotificationDispatcher` — exact-200, 1s→2s→4s… backoff |
//! | `orchestrator` | Round dispatch, fallback decision, response record      |
//!
//! Notification runs on its own task after the sync succeeds; the caller's
//! response never waits on it.

pub mod api;
pub mod generator;
pub mod github;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod sync;
