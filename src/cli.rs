//! Command-line argument handling.
//!
//! Flags are parsed by `arrrg`; the free arguments carry, in order, an
//! optional `@topic`, the `+key=value` property overrides, and the prompt
//! words. Topic and property tokens are only recognized while still at the
//! head of the free arguments; the first plain word starts the prompt and
//! everything after it is prompt text.

use std::io::Read;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};

/// Command-line arguments for the osric tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct Args {
    /// Continue the topic instead of sending a one-shot prompt.
    #[arrrg(flag, "Continue the topic, replaying its full history")]
    pub chat: bool,

    /// Build the request but never send it.
    #[arrrg(flag, "Dry-run mode: print the request and make no API call")]
    pub dry_run: bool,

    /// API name, resolved against the closed set of supported APIs.
    #[arrrg(optional, "API name (default: chat/completions)", "NAME")]
    pub api: Option<String>,

    /// File to read the prompt from when no prompt words are given.
    #[arrrg(optional, "Read the prompt from a file", "FILE")]
    pub file: Option<String>,

    /// Dump the raw response body to a file and exit.
    #[arrrg(optional, "Write the raw response body to a file and exit", "FILE")]
    pub dump: Option<String>,

    /// Replay a previously dumped response instead of calling the API.
    #[arrrg(optional, "Use a dumped response file instead of calling the API", "FILE")]
    pub replay: Option<String>,
}

/// Pulls the `@topic` token out of the head of the free arguments.
///
/// The topic may appear before or between property tokens, but not after
/// the prompt has started. Only the first `@` token is a topic; any later
/// one is prompt text.
pub fn split_topic(tokens: &[String]) -> (Option<String>, Vec<String>) {
    let mut topic = None;
    let mut rest = Vec::with_capacity(tokens.len());
    let mut in_head = true;
    for token in tokens {
        if in_head && topic.is_none() && let Some(name) = token.strip_prefix('@') {
            if name.is_empty() {
                // A bare '@' is prompt text, not an empty topic.
                in_head = false;
                rest.push(token.clone());
            } else {
                topic = Some(name.to_string());
            }
            continue;
        }
        if in_head && !token.starts_with('+') {
            in_head = false;
        }
        rest.push(token.clone());
    }
    (topic, rest)
}

/// Resolves the prompt from its three sources, in priority order: prompt
/// words, the prompt file, standard input.
///
/// # Errors
///
/// `Error::Input` when the prompt file is missing or empty, or when no
/// source yields a prompt at all.
pub fn resolve_prompt(
    words: &str,
    file: Option<&str>,
    diagnostics: &mut dyn FnMut(&str),
) -> Result<String> {
    if !words.is_empty() {
        if let Some(file) = file {
            diagnostics(&format!(
                "* Prompt file `{file}` will be ignored as prompt parameters are provided."
            ));
        }
        return Ok(words.to_string());
    }
    if let Some(file) = file {
        if !std::path::Path::new(file).exists() {
            return Err(Error::input(format!("File not found: {file}.")));
        }
        let text = std::fs::read_to_string(file)
            .map_err(|err| Error::io(format!("failed to read prompt file '{file}'"), err))?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::input(format!("Empty file: {file}.")));
        }
        return Ok(text);
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|err| Error::io("failed to read prompt from stdin", err))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::input("Prompt is required."));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn topic_before_properties() {
        let (topic, rest) = split_topic(&tokens(&["@work", "+n=1", "hello"]));
        assert_eq!(topic.as_deref(), Some("work"));
        assert_eq!(rest, tokens(&["+n=1", "hello"]));
    }

    #[test]
    fn topic_between_properties() {
        let (topic, rest) = split_topic(&tokens(&["+n=1", "@work", "+m=2", "hello"]));
        assert_eq!(topic.as_deref(), Some("work"));
        assert_eq!(rest, tokens(&["+n=1", "+m=2", "hello"]));
    }

    #[test]
    fn at_sign_in_prompt_is_not_a_topic() {
        let (topic, rest) = split_topic(&tokens(&["email", "@work", "about", "this"]));
        assert!(topic.is_none());
        assert_eq!(rest, tokens(&["email", "@work", "about", "this"]));
    }

    #[test]
    fn only_first_at_token_is_topic() {
        let (topic, rest) = split_topic(&tokens(&["@a", "@b"]));
        assert_eq!(topic.as_deref(), Some("a"));
        assert_eq!(rest, tokens(&["@b"]));
    }

    #[test]
    fn prompt_words_beat_prompt_file() {
        let mut warnings = Vec::new();
        let prompt = resolve_prompt("hi there", Some("ignored.txt"), &mut |w| {
            warnings.push(w.to_string())
        })
        .unwrap();
        assert_eq!(prompt, "hi there");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ignored.txt"));
    }

    #[test]
    fn missing_prompt_file_is_input_error() {
        let mut sink = |_: &str| {};
        let err = resolve_prompt("", Some("/nonexistent/prompt.txt"), &mut sink).unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn prompt_file_contents_are_trimmed() {
        let path = std::env::temp_dir().join(format!("osric-prompt-{}.txt", std::process::id()));
        std::fs::write(&path, "  hello from file\n").unwrap();
        let mut sink = |_: &str| {};
        let prompt = resolve_prompt("", Some(path.to_str().unwrap()), &mut sink).unwrap();
        assert_eq!(prompt, "hello from file");
        let _ = std::fs::remove_file(&path);
    }
}
