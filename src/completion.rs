//! Symbol-name completion for line editors.

use std::collections::BTreeSet;

use crate::env::Environment;
use crate::evaluator::SpecialForm;

fn is_word_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '{' | '}')
}

/// Completion candidates for the last word of `line`.
///
/// Returns the byte offset where the completed word starts together with the
/// sorted names that extend it. A word opening a list or vector (`(de`, `[x`)
/// also completes special-form names; the opening character stays in place.
pub fn complete(line: &str, env: &Environment) -> (usize, Vec<String>) {
    let start = line
        .char_indices()
        .rev()
        .find(|&(_, c)| is_word_break(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let word = &line[start..];

    let (start, prefix, in_head) = match word.strip_prefix(['(', '[']) {
        Some(rest) => (start + 1, rest, true),
        None => (start, word, false),
    };
    if prefix.is_empty() && !in_head {
        return (start, Vec::new());
    }

    let mut names: BTreeSet<String> = env
        .bound_names()
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect();
    if in_head {
        names.extend(
            SpecialForm::ALL
                .iter()
                .map(|form| form.name())
                .filter(|name| name.starts_with(prefix))
                .map(str::to_owned),
        );
    }

    (start, names.into_iter().collect())
}
