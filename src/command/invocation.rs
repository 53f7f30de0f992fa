//! Inbound line recognition
//!
//! A line is meant for the bot when its first word is one of the invocation
//! keywords (any case, optionally written as a `/command`). The rest of the
//! line may start with `@user` to run the command in someone else's
//! conversation.

use crate::core::types::UserId;

/// A line addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Index of the matched keyword; doubles as the reply language
    pub keyword_index: usize,
    /// Everything after the keyword, trimmed
    pub body: String,
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

/// Strip the invocation keyword, or `None` when the line is plain chat
pub fn parse_invocation(line: &str, keywords: &[String]) -> Option<Invocation> {
    let (first, rest) = split_first_word(line);
    let word = first.strip_prefix('/').unwrap_or(first);
    // "bot," and "bot:" are common in group chats
    let word = word.trim_end_matches([',', ':']).to_lowercase();
    if word.is_empty() {
        return None;
    }

    let keyword_index = keywords.iter().position(|k| k.to_lowercase() == word)?;
    Some(Invocation {
        keyword_index,
        body: rest.trim_end().to_string(),
    })
}

/// Split a leading `@user` off a command body
pub fn split_addressee(body: &str) -> Option<(UserId, &str)> {
    let (first, rest) = split_first_word(body);
    let name = first.strip_prefix('@')?;
    if name.is_empty() {
        return None;
    }
    Some((UserId::new(name), rest.trim_end()))
}
