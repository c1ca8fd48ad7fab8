//! Pure grading of a submitted answer set against an exam's question list.
//!
//! No I/O happens here; callers load the questions and hand over the already
//! validated selections. Every question of the exam yields exactly one graded
//! answer, whether or not the student answered it.

use std::collections::HashMap;

use crate::db::models::Question;
use crate::db::types::AnswerChoice;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected: Option<AnswerChoice>,
    pub(crate) is_correct: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct GradeOutcome {
    pub(crate) score: i32,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) is_passed: bool,
    pub(crate) answers: Vec<GradedAnswer>,
}

pub(crate) fn grade(
    questions: &[Question],
    selections: &HashMap<String, AnswerChoice>,
    passing_marks: i32,
) -> GradeOutcome {
    let mut score = 0;
    let mut correct_answers = 0;
    let mut answers = Vec::with_capacity(questions.len());

    for question in questions {
        let selected = selections.get(&question.id).copied();
        let is_correct = selected == Some(question.correct_answer);
        if is_correct {
            score += question.marks;
            correct_answers += 1;
        }
        answers.push(GradedAnswer { question_id: question.id.clone(), selected, is_correct });
    }

    GradeOutcome {
        score,
        correct_answers,
        total_questions: questions.len() as i32,
        is_passed: score >= passing_marks,
        answers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn question(id: &str, correct: AnswerChoice, marks: i32) -> Question {
        Question {
            id: id.to_string(),
            exam_id: "exam-1".to_string(),
            question_text: format!("question {id}"),
            option_a: "alpha".to_string(),
            option_b: "beta".to_string(),
            option_c: "gamma".to_string(),
            option_d: "delta".to_string(),
            correct_answer: correct,
            marks,
            position: 0,
            created_at: datetime!(2026-01-10 09:00),
        }
    }

    fn selections(pairs: &[(&str, AnswerChoice)]) -> HashMap<String, AnswerChoice> {
        pairs.iter().map(|(id, tag)| (id.to_string(), *tag)).collect()
    }

    #[test]
    fn full_correct_submission_passes() {
        let questions = [
            question("q1", AnswerChoice::B, 1),
            question("q2", AnswerChoice::A, 1),
            question("q3", AnswerChoice::C, 1),
        ];
        let picked = selections(&[
            ("q1", AnswerChoice::B),
            ("q2", AnswerChoice::A),
            ("q3", AnswerChoice::C),
        ]);

        let outcome = grade(&questions, &picked, 2);

        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.total_questions, 3);
        assert!(outcome.is_passed);
        assert!(outcome.answers.iter().all(|a| a.is_correct));
    }

    #[test]
    fn one_wrong_answer_still_passes_at_the_threshold() {
        let questions = [
            question("q1", AnswerChoice::B, 1),
            question("q2", AnswerChoice::A, 1),
            question("q3", AnswerChoice::C, 1),
        ];
        let picked = selections(&[
            ("q1", AnswerChoice::B),
            ("q2", AnswerChoice::A),
            ("q3", AnswerChoice::D),
        ]);

        let outcome = grade(&questions, &picked, 2);

        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.correct_answers, 2);
        assert_eq!(outcome.total_questions, 3);
        assert!(outcome.is_passed);
        assert!(!outcome.answers[2].is_correct);
    }

    #[test]
    fn unanswered_questions_count_against_the_student() {
        let questions = [
            question("q1", AnswerChoice::B, 1),
            question("q2", AnswerChoice::A, 1),
            question("q3", AnswerChoice::C, 1),
        ];
        let picked = selections(&[("q1", AnswerChoice::B)]);

        let outcome = grade(&questions, &picked, 2);

        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.total_questions, 3);
        assert!(!outcome.is_passed);

        assert_eq!(outcome.answers.len(), 3);
        assert_eq!(outcome.answers[1].selected, None);
        assert!(!outcome.answers[1].is_correct);
        assert_eq!(outcome.answers[2].selected, None);
        assert!(!outcome.answers[2].is_correct);
    }

    #[test]
    fn wrong_answers_earn_nothing() {
        let questions = [question("q1", AnswerChoice::B, 5), question("q2", AnswerChoice::D, 5)];
        let picked = selections(&[("q1", AnswerChoice::C), ("q2", AnswerChoice::D)]);

        let outcome = grade(&questions, &picked, 10);

        assert_eq!(outcome.score, 5);
        assert_eq!(outcome.correct_answers, 1);
        assert!(!outcome.is_passed);
    }

    #[test]
    fn score_equal_to_passing_marks_passes() {
        let questions = [question("q1", AnswerChoice::A, 2), question("q2", AnswerChoice::B, 3)];
        let picked = selections(&[("q1", AnswerChoice::A)]);

        let outcome = grade(&questions, &picked, 2);
        assert_eq!(outcome.score, 2);
        assert!(outcome.is_passed);
    }

    #[test]
    fn empty_exam_grades_to_zero() {
        let outcome = grade(&[], &HashMap::new(), 0);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.total_questions, 0);
        assert!(outcome.is_passed);
        assert!(outcome.answers.is_empty());
    }

    #[test]
    fn weighted_marks_accumulate_per_question() {
        let questions = [
            question("q1", AnswerChoice::A, 1),
            question("q2", AnswerChoice::B, 2),
            question("q3", AnswerChoice::C, 4),
        ];
        let picked = selections(&[("q1", AnswerChoice::A), ("q3", AnswerChoice::C)]);

        let outcome = grade(&questions, &picked, 5);
        assert_eq!(outcome.score, 5);
        assert_eq!(outcome.correct_answers, 2);
        assert!(outcome.is_passed);
    }
}
