//! Prompt construction for the interviewer and the code reviewer.
//!
//! [`PromptBuilder`] produces `(system_msg, user_msg)` pairs for an
//! OpenAI-style `/v1/chat/completions` endpoint.  The interviewer prompt
//! folds in the candidate context, the difficulty guidance and the category
//! of the next question; the user message is the candidate's latest answer.

use serde::Serialize;

use crate::interview::{InterviewConfig, QuestionBucket};

/// Candidate context is cut to this many characters before it is sent.
const CONTEXT_CHAR_LIMIT: usize = 500;

const INTERVIEWER_RESPONSIBILITIES: &str = "\
Your responsibilities:
1. Ask ONE clear, focused question per turn
2. Listen carefully to the candidate's response
3. Provide brief, constructive feedback (1 sentence)
4. Ask follow-up or next question relevant to the interview flow
5. Keep responses concise (max 3 sentences)
6. Be professional, encouraging, and fair
7. Adapt questions based on the candidate's responses";

const WRAP_UP_INSTRUCTION: &str =
    "Thank the candidate for their time and summarize key takeaways.";

const REVIEWER_SYSTEM: &str = "\
You are an expert code reviewer and software engineer. Your task is to review the submitted code and provide constructive feedback.

Analyze the code for:
1. Correctness - Does it solve the problem correctly?
2. Code Quality - Is the code clean, readable, and well-structured?
3. Efficiency - Is it optimal in terms of time and space complexity?
4. Best Practices - Does it follow best practices for the language?
5. Edge Cases - Does it handle edge cases properly?

Provide your review in a structured format with:
- A score from 0-100
- Positive aspects of the code
- Issues found (if any)
- Suggestions for improvement
- Corrected code if needed";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything the interviewer model sees for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewRequest {
    /// The candidate's latest answer.
    pub transcript: String,
    pub cv_content: Option<String>,
    pub job_posting_content: Option<String>,
    pub config: InterviewConfig,
    /// Questions asked so far (0-based index of the next one).
    pub question_count: u32,
    pub question_goal: u32,
    pub candidate_name: Option<String>,
}

/// A solution submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeReviewRequest {
    pub code: String,
    pub problem_description: String,
    pub language: String,
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds chat prompts.
///
/// ```rust
/// use interview_voice::interview::InterviewConfig;
/// use interview_voice::llm::{InterviewRequest, PromptBuilder};
///
/// let request = InterviewRequest {
///     transcript: "I mostly write Rust.".into(),
///     cv_content: None,
///     job_posting_content: None,
///     config: InterviewConfig::default(),
///     question_count: 0,
///     question_goal: 9,
///     candidate_name: None,
/// };
/// let (system, user) = PromptBuilder::interview(&request);
/// assert!(system.contains("Current question: 1 of 9"));
/// assert_eq!(user, "I mostly write Rust.");
/// ```
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn interview(request: &InterviewRequest) -> (String, String) {
        let config = &request.config;
        let total = config.total_questions();
        let count = request.question_count;

        let bucket_guidance = if count < total {
            QuestionBucket::for_index(config, count).guidance()
        } else {
            ""
        };

        let difficulty = config.difficulty;
        let wrap_up = if count >= total { WRAP_UP_INSTRUCTION } else { "" };

        let system = format!(
            "You are an experienced technical interview interviewer conducting a professional interview.\n\
             \n\
             INTERVIEW CONTEXT:\n\
             {context}\n\
             Difficulty Level: {level} - {level_guidance}\n\
             {bucket_guidance}\n\
             \n\
             {INTERVIEWER_RESPONSIBILITIES}\n\
             \n\
             Current question: {next} of {total}\n\
             {wrap_up}",
            context = Self::candidate_context(request),
            level = difficulty.as_str(),
            level_guidance = difficulty.guidance(),
            next = count + 1,
        );

        (system, request.transcript.clone())
    }

    pub fn code_review(request: &CodeReviewRequest) -> (String, String) {
        let language = &request.language;
        let user = format!(
            "Please review this {language} code for the following problem:\n\
             \n\
             Problem: {problem}\n\
             \n\
             Code:\n\
             ```{language}\n\
             {code}\n\
             ```\n\
             \n\
             Provide detailed feedback and a score.",
            problem = request.problem_description,
            code = request.code,
        );
        (REVIEWER_SYSTEM.to_string(), user)
    }

    /// Empty when neither a CV nor a job posting is present.
    fn candidate_context(request: &InterviewRequest) -> String {
        let cv = non_blank(request.cv_content.as_deref());
        let job = non_blank(request.job_posting_content.as_deref());
        if cv.is_none() && job.is_none() {
            return String::new();
        }

        let cv_line = cv
            .map(|c| format!("CV Summary: {}...", truncate_chars(c, CONTEXT_CHAR_LIMIT)))
            .unwrap_or_default();
        let job_line = job
            .map(|j| format!("Job Requirements: {}...", truncate_chars(j, CONTEXT_CHAR_LIMIT)))
            .unwrap_or_default();

        format!("\nCANDIDATE CONTEXT:\n{cv_line}\n{job_line}\n")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
