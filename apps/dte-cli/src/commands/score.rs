// score.rs — Knowledge-check answers and summary.

use dte_progress::scoring::{self, KnowledgeCheck, StoredAnswer};

use super::Context;

pub fn answer(
    ctx: &Context,
    question_id: &str,
    choice: usize,
    answer_count: usize,
    correct_index: usize,
    text: Option<String>,
) -> anyhow::Result<()> {
    if choice >= answer_count {
        anyhow::bail!(
            "choice {} out of range: the question has {} option(s)",
            choice,
            answer_count
        );
    }
    if correct_index >= answer_count {
        anyhow::bail!(
            "correct option {} out of range: the question has {} option(s)",
            correct_index,
            answer_count
        );
    }

    let answer = StoredAnswer::for_choice(question_id, choice, answer_count, correct_index, text);
    scoring::record_answer(ctx.store.backend(), &answer);

    println!(
        "Recorded {}: {} (score {}).",
        answer.question_id,
        if answer.is_correct { "correct" } else { "incorrect" },
        answer.score
    );
    print_summary(&scoring::recompute(ctx.store.backend()));
    Ok(())
}

pub fn show(ctx: &Context) -> anyhow::Result<()> {
    print_summary(&scoring::read_summary(ctx.store.backend()));
    Ok(())
}

fn print_summary(summary: &KnowledgeCheck) {
    if summary.total == 0 {
        println!("No knowledge-check answers yet.");
        return;
    }
    println!(
        "Knowledge check: {}/{} correct",
        summary.correct_count, summary.total
    );
    if summary.all_correct {
        println!("All correct: +{} bonus", summary.correct_bonus);
    }
}
