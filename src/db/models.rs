use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AnswerChoice, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) subject: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) passing_marks: i32,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) correct_answer: AnswerChoice,
    pub(crate) marks: i32,
    pub(crate) position: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

/// One student's single attempt at one exam. `completed_at` is NULL while the
/// attempt is in progress; once set, the row never transitions back.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentExam {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
