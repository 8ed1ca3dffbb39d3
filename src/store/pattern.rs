//! Glob matching over composed keys.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one character, and `\` makes the next character literal. Everything else
//! matches literally.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Star,
    Single,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Star,
            '?' => Token::Single,
            // A trailing backslash matches itself
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            c => Token::Literal(c),
        });
    }
    tokens
}

pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern = tokenize(pattern);
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        let step = match pattern.get(p) {
            Some(Token::Single) => true,
            Some(Token::Literal(c)) => *c == key[k],
            _ => false,
        };

        if step {
            p += 1;
            k += 1;
        } else if pattern.get(p) == Some(&Token::Star) {
            backtrack = Some((p, k));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            k = matched + 1;
            backtrack = Some((star, k));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|t| *t == Token::Star)
}

/// Escapes `literal` so [`glob_match`] matches it character for character.
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
