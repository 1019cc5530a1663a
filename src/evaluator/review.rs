use tracing::warn;

use crate::llm::TextGenerator;

use super::models::LlmReview;

pub const README_MISSING: &str = "README.md not found";

fn review_prompt(readme: &str, brief: &str) -> String {
    format!(
        "You are grading a student's submission for this task:\n\n{brief}\n\n\
         Review the README below for clarity, completeness and how well it \
         explains the app. Reply with a short paragraph of feedback.\n\n\
         README.md:\n{readme}"
    )
}

/// Ask the backend for feedback on the README. Never fails; backend errors
/// are reported inside the feedback text.
pub async fn review_readme(
    backend: &dyn TextGenerator,
    readme: Option<&str>,
    brief: &str,
) -> LlmReview {
    let Some(readme) = readme else {
        return LlmReview {
            readme_feedback: README_MISSING.to_string(),
        };
    };

    let readme_feedback = match backend.complete(&review_prompt(readme, brief)).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "README review failed");
            format!("Review failed: {}", e)
        }
    };
    LlmReview { readme_feedback }
}
