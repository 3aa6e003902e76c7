//! Shell word rules for literal match fragments.
//!
//! Literal matches are written the way they would be typed after `iptables`
//! on a command line. Commands are executed without a shell, so the fragments
//! are split here, and arguments are quoted again when a command is rendered.

use std::borrow::Cow;

/// Splits `input` into words following POSIX shell quoting.
///
/// Single quotes preserve everything up to the closing quote. Inside double
/// quotes a backslash only escapes `"`, `\`, `$` and `` ` ``. Outside quotes a
/// backslash escapes any character. Returns `None` on an unterminated quote or
/// a trailing backslash.
pub fn split_words(input: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        c => current.push(c),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            c @ ('"' | '\\' | '$' | '`') => current.push(c),
                            c => {
                                current.push('\\');
                                current.push(c);
                            }
                        },
                        c => current.push(c),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:,=+@%!".contains(c)
}

/// Quotes `word` so that [`split_words`] (or a shell) yields it unchanged.
pub fn quote_word(word: &str) -> Cow<'_, str> {
    if !word.is_empty() && word.chars().all(is_plain) {
        return Cow::Borrowed(word);
    }
    Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
}
