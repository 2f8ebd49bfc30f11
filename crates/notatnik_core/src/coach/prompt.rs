//! crates/notatnik_core/src/coach/prompt.rs
//!
//! The fixed prompt template for the note coach.

use crate::domain::{ChatTurn, Sender};

/// Word budget the model is asked to respect.
pub const MAX_RESPONSE_WORDS: usize = 200;

/// Sent to a candidate model to check that it responds at all.
pub const PROBE_PROMPT: &str = "Reply with the single word: ready";

fn label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "User",
        Sender::Ai => "Coach",
    }
}

/// Builds the complete prompt: the template, then the history (if any) followed
/// by the current message repeated as the final user turn.
pub fn build_coach_prompt(
    note_title: &str,
    note_content: &str,
    user_message: &str,
    history: &[ChatTurn],
) -> String {
    // Filled in one pass so user text is never re-scanned for placeholders.
    let mut prompt = format!(
        r#"You are an experienced psychologist and life coach. The user has shared a problem with you in a note:

**Problem title:** {note_title}
**Problem description:** {note_content}

**The user's current message:** {user_message}

As a psychologist and coach:
1. Show empathy and understanding
2. Ask helpful questions (where appropriate)
3. Suggest concrete, achievable solutions
4. Encourage positive thinking
5. Write in a warm and supportive way

Reply in the language of the user's message, in at most {MAX_RESPONSE_WORDS} words."#
    );

    if !history.is_empty() {
        prompt.push_str("\n\n**Conversation history:**\n");
        for turn in history {
            prompt.push_str(label(turn.sender));
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
        prompt.push_str("\nUser: ");
        prompt.push_str(user_message);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_history_is_the_filled_template() {
        let prompt = build_coach_prompt("Sleep", "I wake up at 4am", "What can I do?", &[]);
        assert!(prompt.contains("**Problem title:** Sleep"));
        assert!(prompt.contains("**Problem description:** I wake up at 4am"));
        assert!(prompt.contains("**The user's current message:** What can I do?"));
        assert!(prompt.contains("at most 200 words"));
        assert!(!prompt.contains("Conversation history"));
    }

    #[test]
    fn history_turns_are_labelled_by_their_sender() {
        // Two user turns in a row, e.g. after a failed coach reply.
        let history = vec![
            ChatTurn {
                sender: Sender::User,
                text: "first".into(),
            },
            ChatTurn {
                sender: Sender::User,
                text: "retry".into(),
            },
            ChatTurn {
                sender: Sender::Ai,
                text: "answer".into(),
            },
        ];
        let prompt = build_coach_prompt("t", "c", "next", &history);
        let tail = prompt.split("**Conversation history:**\n").nth(1).unwrap();
        assert_eq!(tail, "User: first\nUser: retry\nCoach: answer\n\nUser: next");
    }

    #[test]
    fn placeholder_text_from_the_user_is_kept_verbatim() {
        let prompt = build_coach_prompt(
            "Budget {message}",
            "Use {max_words} or {title}",
            "hello {content}",
            &[],
        );
        assert!(prompt.contains("**Problem title:** Budget {message}\n"));
        assert!(prompt.contains("**Problem description:** Use {max_words} or {title}\n"));
        assert!(prompt.contains("**The user's current message:** hello {content}\n"));
        assert!(prompt.contains("at most 200 words"));
    }
}
