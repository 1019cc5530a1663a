//! Evaluation database bootstrap — `pagesmith init-db`.

use std::path::Path;

use anyhow::Result;

pub fn cmd_init_db(db_path: &Path) -> Result<()> {
    pagesmith::evaluator::db::EvaluationDb::new(db_path)?;
    println!("Evaluation database initialized at {}", db_path.display());
    Ok(())
}
