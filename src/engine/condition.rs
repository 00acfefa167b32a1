//! Attribute-condition handling for the identity provider.
//!
//! Conditions of the shapes this tool writes are parsed into the set of
//! repositories they admit so that `attribute.repository == "a"` and
//! `attribute.repository=='a'` compare equal. Anything else falls back to a
//! whitespace-insensitive text comparison.

use std::collections::BTreeSet;

const REPOSITORY_REF: &str = "attribute.repository";

/// Render the condition admitting exactly `repositories`
pub fn render(repositories: &[String]) -> String {
    let unique: BTreeSet<&str> = repositories.iter().map(String::as_str).collect();
    if unique.len() == 1 {
        format!("{}=='{}'", REPOSITORY_REF, unique.iter().next().copied().unwrap_or_default())
    } else {
        let items = unique
            .iter()
            .map(|r| format!("'{}'", r))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} in [{}]", REPOSITORY_REF, items)
    }
}

/// Parse a quoted CEL string literal, returning the literal and the remaining input
fn parse_literal(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    let quote = input.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &input[1..];
    let end = body.find(quote)?;
    let literal = &body[..end];
    if literal.contains('\\') {
        return None;
    }
    Some((literal, &body[end + 1..]))
}

/// Whether the opening parenthesis at the start of `term` closes at its very end
fn is_wrapped(term: &str) -> bool {
    if !(term.starts_with('(') && term.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in term.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != term.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn strip_parens(term: &str) -> &str {
    let mut term = term.trim();
    while is_wrapped(term) {
        term = term[1..term.len() - 1].trim();
    }
    term
}

/// Parse one `attribute.repository == '...'` or `attribute.repository in [...]` term
fn parse_term(term: &str, out: &mut BTreeSet<String>) -> Option<()> {
    let rest = strip_parens(term).strip_prefix(REPOSITORY_REF)?.trim_start();

    if let Some(rest) = rest.strip_prefix("==") {
        let (literal, tail) = parse_literal(rest)?;
        if !tail.trim().is_empty() {
            return None;
        }
        out.insert(literal.to_string());
        return Some(());
    }

    let rest = rest.strip_prefix("in")?.trim_start();
    let list = rest.strip_prefix('[')?.trim_end().strip_suffix(']')?;
    let mut remaining = list;
    loop {
        if remaining.trim().is_empty() {
            break;
        }
        let (literal, tail) = parse_literal(remaining)?;
        out.insert(literal.to_string());
        let tail = tail.trim_start();
        remaining = match tail.strip_prefix(',') {
            Some(next) => next,
            None if tail.is_empty() => tail,
            None => return None,
        };
    }
    Some(())
}

/// Repositories admitted by `condition`, or `None` when it is not a recognised shape
pub fn admitted_repositories(condition: &str) -> Option<BTreeSet<String>> {
    let mut repositories = BTreeSet::new();
    for term in strip_parens(condition).split("||") {
        parse_term(term, &mut repositories)?;
    }
    if repositories.is_empty() {
        return None;
    }
    Some(repositories)
}

/// Drop whitespace outside string literals and unify the quote style
fn normalize(condition: &str) -> String {
    let mut out = String::with_capacity(condition.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in condition.chars() {
        match quote {
            Some(open) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == open {
                    quote = None;
                    out.push('\'');
                    continue;
                }
                out.push(c);
            }
            None if c.is_whitespace() => {}
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push('\'');
            }
            None => out.push(c),
        }
    }
    out
}

/// Whether the live condition restricts to exactly the expected repositories
///
/// A missing condition never matches: it would federate every repository the
/// issuer signs tokens for.
pub fn is_equivalent(actual: Option<&str>, expected: &str) -> bool {
    let Some(actual) = actual.filter(|c| !c.trim().is_empty()) else {
        return false;
    };
    match (admitted_repositories(actual), admitted_repositories(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => normalize(actual) == normalize(expected),
    }
}

/// Whether the condition admits `repository`
///
/// `Some(true)` when there is no condition at all, `None` when the condition
/// cannot be evaluated.
pub fn admits(condition: Option<&str>, repository: &str) -> Option<bool> {
    match condition.filter(|c| !c.trim().is_empty()) {
        None => Some(true),
        Some(c) => admitted_repositories(c).map(|set| set.contains(repository)),
    }
}
