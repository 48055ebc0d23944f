//! Shell pathname patterns, matched one path segment at a time.

use glob::{MatchOptions, Pattern};

const SEGMENT: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

const VARIANT_SAMPLES: &[char] = &['_', '-', '.', '~', '0', '1', '5', '9'];

pub fn is_pattern(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
        || (segment.contains('{') && segment.contains(',') && segment.contains('}'))
}

/// A pattern made only of `*` and `?` says nothing about the name it matches.
pub fn is_bare_wildcard(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| matches!(c, '*' | '?'))
}

/// Whether `pattern` can expand to exactly `name`.
pub fn matches(pattern: &str, name: &str) -> bool {
    expand_braces(pattern)
        .iter()
        .any(|alternative| segment_matches(alternative, name))
}

/// Whether `pattern` can expand to `name` itself or to `name` followed by a
/// character accepted by `continues`.
pub fn matches_prefix(pattern: &str, name: &str, continues: fn(char) -> bool) -> bool {
    expand_braces(pattern).iter().any(|alternative| {
        token_ends(alternative).into_iter().any(|end| {
            let (head, tail) = alternative.split_at(end);
            segment_matches(head, name) && (head.ends_with('*') || can_continue(tail, continues))
        })
    })
}

// An unparseable pattern is an ordinary name to the shell.
fn segment_matches(pattern: &str, name: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches_with(name, SEGMENT),
        Err(_) => pattern == name,
    }
}

fn can_continue(tail: &str, continues: fn(char) -> bool) -> bool {
    let Some(first) = tail.chars().next() else {
        return true;
    };
    match first {
        '*' | '?' => true,
        '[' => {
            let class = &tail[..token_width(tail)];
            VARIANT_SAMPLES
                .iter()
                .any(|c| continues(*c) && segment_matches(class, &c.to_string()))
        }
        other => continues(other),
    }
}

fn token_ends(pattern: &str) -> Vec<usize> {
    let mut ends = vec![0];
    let mut at = 0;
    while at < pattern.len() {
        at += token_width(&pattern[at..]);
        ends.push(at);
    }
    ends
}

// Byte width of the leading token. A `]` right after `[` or `[!` is a member.
fn token_width(pattern: &str) -> usize {
    let Some(first) = pattern.chars().next() else {
        return 0;
    };
    if first == '[' {
        let members = usize::from(pattern[1..].starts_with('!')) + 1;
        if let Some(close) = pattern.get(1 + members..).and_then(|rest| rest.find(']')) {
            return 1 + members + close + 1;
        }
    }
    first.len_utf8()
}

// `{a,b}c` expands to `ac` and `bc`; nested groups expand from the left.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|offset| open + offset) else {
        return vec![pattern.to_string()];
    };
    let inner = &pattern[open + 1..close];
    if !inner.contains(',') {
        return vec![pattern.to_string()];
    }
    let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
    inner
        .split(',')
        .flat_map(|choice| expand_braces(&format!("{head}{choice}{tail}")))
        .collect()
}
