//! Assessment grading.

use serde::{Deserialize, Serialize};

use crate::artifacts::QuizQuestion;

/// Default pass mark, in percent.
pub const DEFAULT_PASS_PERCENT: u32 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub passed: bool,
}

/// Grade `answers` against `questions`, position by position.
///
/// An answer counts when it equals the correct one after trimming and case
/// folding. Missing answers are wrong.
pub fn grade(
    questions: &[QuizQuestion],
    answers: &[Option<String>],
    pass_percent: u32,
) -> QuizResult {
    let score = questions
        .iter()
        .enumerate()
        .filter(|(i, q)| {
            answers
                .get(*i)
                .and_then(|a| a.as_deref())
                .is_some_and(|a| answers_match(a, &q.correct_answer))
        })
        .count();

    let total = questions.len();
    let percentage = if total == 0 {
        0
    } else {
        (score as f64 / total as f64 * 100.0).round() as u32
    };

    QuizResult {
        score,
        total,
        percentage,
        passed: total > 0 && percentage >= pass_percent,
    }
}

/// Totals over every assessment taken so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub taken: usize,
    pub passed: usize,
    /// Mean of the per-quiz percentages, rounded.
    pub average_percent: u32,
    /// Average at or above [`DEFAULT_PASS_PERCENT`].
    pub on_track: bool,
}

pub fn summarize(results: &[QuizResult]) -> QuizSummary {
    let taken = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let average_percent = if taken == 0 {
        0
    } else {
        let sum: u64 = results.iter().map(|r| u64::from(r.percentage)).sum();
        (sum as f64 / taken as f64).round() as u32
    };

    QuizSummary {
        taken,
        passed,
        average_percent,
        on_track: taken > 0 && average_percent >= DEFAULT_PASS_PERCENT,
    }
}

fn answers_match(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}
