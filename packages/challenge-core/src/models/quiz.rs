use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Answer correctness check: trimmed, case-insensitive comparison against
/// the stored correct answer. No partial credit.
pub fn validate_answer(question: &Question, submitted: &str) -> bool {
    question
        .correct_answer
        .trim()
        .eq_ignore_ascii_case(submitted.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str) -> Question {
        Question {
            question_id: "q1".to_string(),
            text: "Capital of France?".to_string(),
            options: vec!["Paris".to_string(), "Lyon".to_string()],
            correct_answer: correct.to_string(),
        }
    }

    #[test]
    fn test_exact_answer_is_correct() {
        assert!(validate_answer(&question("Paris"), "Paris"));
    }

    #[test]
    fn test_answer_is_case_insensitive() {
        assert!(validate_answer(&question("Paris"), "paris"));
        assert!(validate_answer(&question("paris"), "PARIS"));
    }

    #[test]
    fn test_answer_ignores_surrounding_whitespace() {
        assert!(validate_answer(&question("Paris"), "  Paris "));
        assert!(validate_answer(&question(" Paris "), "Paris"));
    }

    #[test]
    fn test_wrong_answer_is_incorrect() {
        assert!(!validate_answer(&question("Paris"), "Lyon"));
        assert!(!validate_answer(&question("Paris"), ""));
    }
}
