//! Advisory prompt assembly under a batch and character budget.

use flagcaddy_pilot::strip_ansi;
use flagcaddy_types::{Event, EventId};

use crate::facts::categorize_command;

const HEADER: &str = "You are assisting an operator during a penetration test or CTF. \
Recent terminal activity follows, oldest first.\n\n";

const SUFFIX: &str = "Summarize what has been learned so far, then list concrete next steps \
with the exact commands to run, most promising first.";

const TRUNCATED_MARKER: &str = " [...]";

/// Limits applied while building a prompt. Lengths are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    pub max_events: usize,
    pub max_chars: usize,
    pub max_output_chars_per_event: usize,
}

/// A built prompt and the events it covers, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryPrompt {
    pub text: String,
    pub event_ids: Vec<EventId>,
}

/// Build a prompt from events ordered most recent first.
///
/// The newest `max_events` events are kept and laid out oldest first. Each
/// block is checked against the remaining budget before it is appended;
/// assembly stops at the first block that does not fit. The result never
/// exceeds `max_chars` characters.
pub fn build_prompt(events_most_recent_first: &[Event], budget: &PromptBudget) -> AdvisoryPrompt {
    let fixed = char_len(HEADER) + char_len(SUFFIX);
    if fixed > budget.max_chars {
        return AdvisoryPrompt {
            text: SUFFIX.chars().take(budget.max_chars).collect(),
            event_ids: Vec::new(),
        };
    }

    let mut text = String::from(HEADER);
    let mut used = fixed;
    let mut event_ids = Vec::new();

    let batch = &events_most_recent_first[..events_most_recent_first.len().min(budget.max_events)];
    for event in batch.iter().rev() {
        let block = format_block(event, budget.max_output_chars_per_event);
        let len = char_len(&block);
        if used + len > budget.max_chars {
            break;
        }
        text.push_str(&block);
        used += len;
        event_ids.push(event.id);
    }

    text.push_str(SUFFIX);
    AdvisoryPrompt { text, event_ids }
}

fn format_block(event: &Event, max_output_chars: usize) -> String {
    let output = strip_ansi(&event.output);
    format!(
        "### Event {} [{}] novelty {:.2}{}\nCommand: {}\nOutput:\n{}\n\n",
        event.id,
        categorize_command(&event.command),
        event.novelty,
        if event.duplicate { " (repeat)" } else { "" },
        event.command,
        truncate_chars(output.trim(), max_output_chars),
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{TRUNCATED_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
