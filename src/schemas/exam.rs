use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, Question};
use crate::db::types::AnswerChoice;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, max = 2000))]
    pub(crate) question_text: String,
    #[validate(length(min = 1, max = 500))]
    pub(crate) option_a: String,
    #[validate(length(min = 1, max = 500))]
    pub(crate) option_b: String,
    #[validate(length(min = 1, max = 500))]
    pub(crate) option_c: String,
    #[validate(length(min = 1, max = 500))]
    pub(crate) option_d: String,
    /// One of "A", "B", "C", "D". Validated separately so the error names the
    /// offending value.
    pub(crate) correct_answer: String,
    #[validate(range(min = 0, max = 1000))]
    pub(crate) marks: Option<i32>,
}

impl QuestionCreate {
    pub(crate) fn correct_tag(&self) -> Option<AnswerChoice> {
        AnswerChoice::parse(&self.correct_answer)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 200))]
    pub(crate) title: String,
    #[validate(length(max = 2000))]
    pub(crate) description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub(crate) subject: String,
    #[validate(range(min = 1, max = 1440))]
    pub(crate) duration_minutes: i32,
    #[validate(range(min = 0))]
    pub(crate) total_marks: i32,
    #[validate(range(min = 0))]
    pub(crate) passing_marks: i32,
    pub(crate) is_active: Option<bool>,
    #[validate(nested)]
    pub(crate) questions: Option<Vec<QuestionCreate>>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[validate(length(min = 1, max = 200))]
    pub(crate) title: Option<String>,
    #[validate(length(max = 2000))]
    pub(crate) description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub(crate) subject: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub(crate) duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub(crate) total_marks: Option<i32>,
    #[validate(range(min = 0))]
    pub(crate) passing_marks: Option<i32>,
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) marks: i32,
    pub(crate) position: i32,
    /// Present only for staff; students never see the key before grading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<AnswerChoice>,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: &Question, reveal_correct: bool) -> Self {
        Self {
            id: question.id.clone(),
            question_text: question.question_text.clone(),
            option_a: question.option_a.clone(),
            option_b: question.option_b.clone(),
            option_c: question.option_c.clone(),
            option_d: question.option_d.clone(),
            marks: question.marks,
            position: question.position,
            correct_answer: reveal_correct.then_some(question.correct_answer),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) subject: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) questions: Option<Vec<QuestionResponse>>,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: &Exam, questions: Option<Vec<QuestionResponse>>) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            description: exam.description.clone(),
            subject: exam.subject.clone(),
            duration_minutes: exam.duration_minutes,
            total_marks: exam.total_marks,
            passing_marks: exam.passing_marks,
            is_active: exam.is_active,
            created_by: exam.created_by.clone(),
            created_at: format_primitive(exam.created_at),
            questions,
        }
    }
}
