use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::StudentExam;
use crate::db::types::AnswerChoice;
use crate::repositories::attempts::AnswerDetailRow;
use crate::schemas::exam::QuestionResponse;
use crate::services::attempts::StartedAttempt;

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct AnswerEntry {
    pub(crate) question_id: String,
    pub(crate) selected_answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitExamRequest {
    #[validate(length(max = 500))]
    pub(crate) answers: Vec<AnswerEntry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
}

impl AttemptResponse {
    pub(crate) fn from_db(attempt: &StudentExam) -> Self {
        Self {
            id: attempt.id.clone(),
            student_id: attempt.student_id.clone(),
            exam_id: attempt.exam_id.clone(),
            started_at: format_primitive(attempt.started_at),
            completed_at: attempt.completed_at.map(format_primitive),
            score: attempt.score,
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            is_passed: attempt.is_passed,
        }
    }
}

/// Returned when an attempt opens. Carries the question sheet with the correct
/// tags withheld.
#[derive(Debug, Serialize)]
pub(crate) struct StartExamResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) started_at: String,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl StartExamResponse {
    pub(crate) fn from_started(started: &StartedAttempt) -> Self {
        Self {
            attempt_id: started.attempt.id.clone(),
            exam_id: started.exam.id.clone(),
            exam_title: started.exam.title.clone(),
            duration_minutes: started.exam.duration_minutes,
            total_marks: started.exam.total_marks,
            passing_marks: started.exam.passing_marks,
            started_at: format_primitive(started.attempt.started_at),
            questions: started
                .questions
                .iter()
                .map(|q| QuestionResponse::from_db(q, false))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: Option<String>,
}

impl GradeResponse {
    pub(crate) fn from_db(attempt: &StudentExam, total_marks: i32, passing_marks: i32) -> Self {
        Self {
            attempt_id: attempt.id.clone(),
            exam_id: attempt.exam_id.clone(),
            score: attempt.score,
            total_marks,
            passing_marks,
            correct_answers: attempt.correct_answers,
            total_questions: attempt.total_questions,
            is_passed: attempt.is_passed,
            completed_at: attempt.completed_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerDetailResponse {
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) correct_answer: AnswerChoice,
    pub(crate) selected_answer: Option<AnswerChoice>,
    pub(crate) is_correct: bool,
    pub(crate) marks: i32,
}

impl AnswerDetailResponse {
    pub(crate) fn from_row(row: &AnswerDetailRow) -> Self {
        Self {
            question_id: row.question_id.clone(),
            question_text: row.question_text.clone(),
            option_a: row.option_a.clone(),
            option_b: row.option_b.clone(),
            option_c: row.option_c.clone(),
            option_d: row.option_d.clone(),
            correct_answer: row.correct_answer,
            selected_answer: row.selected_answer,
            is_correct: row.is_correct,
            marks: row.marks,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultDetailResponse {
    pub(crate) attempt: GradeResponse,
    pub(crate) exam_title: String,
    pub(crate) student_name: String,
    pub(crate) answers: Vec<AnswerDetailResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_keeps_raw_answer_tags() {
        let payload: SubmitExamRequest = serde_json::from_value(serde_json::json!({
            "answers": [
                {"question_id": "q1", "selected_answer": "B"},
                {"question_id": "q2", "selected_answer": "E"}
            ]
        }))
        .expect("deserialize");

        assert_eq!(payload.answers.len(), 2);
        // Tag validation happens in the attempt service, not during parsing.
        assert_eq!(payload.answers[1].selected_answer, "E");
    }
}
