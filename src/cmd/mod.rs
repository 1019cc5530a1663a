//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `serve`    | `Serve`          |
//! | `evaluate` | `Evaluate`       |
//! | `init_db`  | `InitDb`         |

pub mod evaluate;
pub mod init_db;
pub mod serve;

pub use evaluate::cmd_evaluate;
pub use init_db::cmd_init_db;
pub use serve::cmd_serve;
