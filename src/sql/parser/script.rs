//! Splits raw input into individual statements.
//!
//! `--` line comments and `/* */` block comments are removed, whitespace-only
//! lines are dropped and the remainder is cut on `;`. Quotes are tracked so
//! comment markers and semicolons inside string literals are left alone.

use std::{iter::Peekable, str::Chars};

/// Removes comments and blank lines from the input
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut iter = input.chars().peekable();
    while let Some(c) = iter.next() {
        match c {
            '\'' | '"' | '`' => copy_quoted(c, &mut iter, &mut out),
            '-' if iter.peek() == Some(&'-') => {
                while let Some(&next) = iter.peek() {
                    if next == '\n' {
                        break;
                    }
                    iter.next();
                }
            }
            '/' if iter.peek() == Some(&'*') => {
                iter.next();
                let mut prev = '\0';
                for next in iter.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                // keep adjacent tokens apart
                out.push(' ');
            }
            c => out.push(c),
        }
    }
    out.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips comments, then cuts the input into trimmed, non-empty statements
pub fn split_statements(input: &str) -> Vec<String> {
    let cleaned = strip_comments(input);
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut iter = cleaned.chars().peekable();
    while let Some(c) = iter.next() {
        match c {
            '\'' | '"' | '`' => copy_quoted(c, &mut iter, &mut current),
            ';' => push_statement(&mut statements, &mut current),
            c => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    current.clear();
}

/// Copies a quoted run verbatim, including both quote characters.
/// An unterminated quote swallows the rest of the input; the lexer reports it.
fn copy_quoted(quote: char, iter: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push(quote);
    while let Some(c) = iter.next() {
        out.push(c);
        if c == quote {
            if iter.peek() == Some(&quote) {
                if let Some(escaped) = iter.next() {
                    out.push(escaped);
                }
                continue;
            }
            return;
        }
    }
}
