use serde::Serialize;

use crate::models::{Answer, QuizContent};
use crate::progress::percentage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub id: u32,
    pub correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    pub correct: u32,
    pub total: u32,
    pub score: u32,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
}

/// Grades answers given in question order. Missing answers count as wrong.
pub fn grade(quiz: &QuizContent, answers: &[Answer]) -> QuizOutcome {
    let feedback: Vec<QuestionFeedback> = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| QuestionFeedback {
            id: q.id,
            correct: answers.get(i) == Some(&q.correct),
            explanation: q.explanation.clone(),
        })
        .collect();

    let correct = feedback.iter().filter(|f| f.correct).count() as u32;
    let total = feedback.len() as u32;
    let score = percentage(correct, total);

    QuizOutcome {
        correct,
        total,
        score,
        // An empty quiz has nothing to pass.
        passed: total > 0 && score >= quiz.passing_score,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionType};

    fn quiz(passing_score: u32) -> QuizContent {
        let q = |id, kind, correct| Question {
            id,
            kind,
            question: format!("question {}", id),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct,
            explanation: format!("because {}", id),
        };
        QuizContent {
            title: "Budgeting Quiz".to_string(),
            duration: "10 min".to_string(),
            points: 200,
            passing_score,
            questions: vec![
                q(1, QuestionType::MultipleChoice, Answer::Choice(2)),
                q(2, QuestionType::TrueFalse, Answer::Truth(true)),
                q(3, QuestionType::MultipleChoice, Answer::Choice(0)),
            ],
        }
    }

    #[test]
    fn test_all_correct() {
        let outcome = grade(
            &quiz(70),
            &[Answer::Choice(2), Answer::Truth(true), Answer::Choice(0)],
        );
        assert_eq!(outcome.correct, 3);
        assert_eq!(outcome.score, 100);
        assert!(outcome.passed);
        assert!(outcome.feedback.iter().all(|f| f.correct));
    }

    #[test]
    fn test_passing_threshold_is_inclusive() {
        let answers = [Answer::Choice(2), Answer::Truth(true), Answer::Choice(1)];
        assert!(grade(&quiz(67), &answers).passed);
        assert!(!grade(&quiz(70), &answers).passed);
        assert_eq!(grade(&quiz(70), &answers).score, 67);
    }

    #[test]
    fn test_missing_and_mistyped_answers_are_wrong() {
        let outcome = grade(&quiz(70), &[Answer::Truth(true)]);
        assert_eq!(outcome.correct, 0);
        assert_eq!(outcome.total, 3);
        assert!(!outcome.passed);
        assert_eq!(outcome.feedback[2].explanation, "because 3");
    }

    #[test]
    fn test_empty_quiz_never_passes() {
        let mut empty = quiz(0);
        empty.questions.clear();
        let outcome = grade(&empty, &[]);
        assert_eq!(outcome.score, 0);
        assert!(!outcome.passed);
    }
}
