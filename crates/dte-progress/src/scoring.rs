//! Knowledge-check scoring written by the Execute flow.
//!
//! These keys are a side channel for the score display; the progress core
//! never reads them and `reset` leaves them alone. The same error policy
//! applies: unreadable or corrupt data counts as "no answers", writes are
//! best-effort.

use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

pub const ANSWERS_KEY: &str = "answers";
pub const KC_TOTAL_KEY: &str = "kcTotal";
pub const KC_CORRECT_COUNT_KEY: &str = "kcCorrectCount";
pub const KC_ALL_CORRECT_KEY: &str = "kcAllCorrect";
pub const KC_CORRECT_BONUS_KEY: &str = "kcCorrectBonus";

/// Bonus awarded when every gradable answer is correct.
pub const ALL_CORRECT_BONUS: u32 = 15;

/// One answered question, as stored in the `answers` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub score: u32,
    pub score_type: String,
    pub answer: Option<String>,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
    pub gradable: bool,
}

impl StoredAnswer {
    /// Build the record for picking option `choice` out of `answer_count`.
    ///
    /// Earlier options score higher: the first option is worth
    /// `answer_count - 1` points, the last one 0.
    pub fn for_choice(
        question_id: impl Into<String>,
        choice: usize,
        answer_count: usize,
        correct_index: usize,
        answer: Option<String>,
    ) -> Self {
        let score = answer_count.saturating_sub(1).saturating_sub(choice);
        Self {
            question_id: question_id.into(),
            score: u32::try_from(score).unwrap_or(u32::MAX),
            score_type: "confidence".to_string(),
            answer,
            is_correct: choice == correct_index,
            gradable: true,
        }
    }
}

/// Summary of the knowledge-check answers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeCheck {
    pub total: u32,
    pub correct_count: u32,
    pub all_correct: bool,
    pub correct_bonus: u32,
}

impl KnowledgeCheck {
    fn from_counts(total: u32, correct_count: u32) -> Self {
        let all_correct = total > 0 && correct_count == total;
        Self {
            total,
            correct_count,
            all_correct,
            correct_bonus: if all_correct { ALL_CORRECT_BONUS } else { 0 },
        }
    }
}

/// Read the stored answers as loose JSON values. Anything but an array
/// reads as `None` (corrupt), a missing key as an empty list.
fn load_answers<S: KeyValueStore + ?Sized>(store: &S) -> Option<Vec<serde_json::Value>> {
    match store.get(ANSWERS_KEY) {
        Ok(None) => Some(Vec::new()),
        Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
        Err(e) => {
            tracing::warn!("answers unreadable: {}", e);
            None
        }
    }
}

/// Append `answer` to the stored answers. A corrupt list is replaced by a
/// fresh one holding only this answer.
pub fn record_answer<S: KeyValueStore + ?Sized>(store: &S, answer: &StoredAnswer) {
    let mut answers = load_answers(store).unwrap_or_else(|| {
        tracing::debug!("replacing unreadable answers list");
        Vec::new()
    });

    match serde_json::to_value(answer) {
        Ok(value) => answers.push(value),
        Err(e) => {
            tracing::warn!("failed to encode answer: {}", e);
            return;
        }
    }

    let encoded = serde_json::Value::Array(answers).to_string();
    if let Err(e) = store.set(ANSWERS_KEY, &encoded) {
        tracing::warn!("failed to persist answers: {}", e);
    }
}

fn flag(entry: &serde_json::Value, name: &str) -> bool {
    entry.get(name).and_then(|f| f.as_bool()) == Some(true)
}

/// Count gradable answers, persist the knowledge-check keys and return the
/// summary. Entries that aren't objects or lack the flags count as
/// ungradable / incorrect.
pub fn recompute<S: KeyValueStore + ?Sized>(store: &S) -> KnowledgeCheck {
    let answers = load_answers(store).unwrap_or_default();

    let gradable: Vec<&serde_json::Value> = answers.iter().filter(|a| flag(a, "gradable")).collect();
    let total = gradable.len() as u32;
    let correct_count = gradable.iter().filter(|a| flag(a, "isCorrect")).count() as u32;

    let summary = KnowledgeCheck::from_counts(total, correct_count);

    let writes = [
        (KC_TOTAL_KEY, summary.total.to_string()),
        (KC_CORRECT_COUNT_KEY, summary.correct_count.to_string()),
        (KC_ALL_CORRECT_KEY, summary.all_correct.to_string()),
        (KC_CORRECT_BONUS_KEY, summary.correct_bonus.to_string()),
    ];
    for (key, value) in writes {
        if let Err(e) = store.set(key, &value) {
            tracing::warn!(key, "failed to persist knowledge-check key: {}", e);
        }
    }

    summary
}

/// Read the last persisted summary without recomputing. Missing or
/// unparsable keys read as zero / false.
pub fn read_summary<S: KeyValueStore + ?Sized>(store: &S) -> KnowledgeCheck {
    let read = |key: &str| store.get(key).ok().flatten();
    let number = |key: &str| read(key).and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);

    KnowledgeCheck {
        total: number(KC_TOTAL_KEY),
        correct_count: number(KC_CORRECT_COUNT_KEY),
        all_correct: read(KC_ALL_CORRECT_KEY).as_deref() == Some("true"),
        correct_bonus: number(KC_CORRECT_BONUS_KEY),
    }
}
