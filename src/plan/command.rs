// ABOUTME: Splits a command string into argv with shell-like quoting.
// ABOUTME: Supports whitespace, single quotes, double quotes and backslash escapes.

use crate::expr::EvalError;

/// Split `input` into words.
pub fn split_command(input: &str) -> Result<Vec<String>, EvalError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(malformed("unterminated single quote")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(malformed("unterminated double quote")),
                        },
                        Some(c) => current.push(c),
                        None => return Err(malformed("unterminated double quote")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('\n') => {}
                    Some(c) => current.push(c),
                    None => return Err(malformed("trailing backslash")),
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
    Ok(words)
}

fn malformed(reason: &str) -> EvalError {
    EvalError::MalformedCommand(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            split_command("  nginx -g  daemon\toff ").unwrap(),
            vec!["nginx", "-g", "daemon", "off"]
        );
    }

    #[test]
    fn quotes_group_words() {
        assert_eq!(
            split_command(r#"sh -c 'echo hi' "a b""#).unwrap(),
            vec!["sh", "-c", "echo hi", "a b"]
        );
    }

    #[test]
    fn adjacent_quotes_join() {
        assert_eq!(split_command(r#"a'b'"c""#).unwrap(), vec!["abc"]);
    }

    #[test]
    fn empty_quotes_make_empty_word() {
        assert_eq!(split_command("run ''").unwrap(), vec!["run", ""]);
    }

    #[test]
    fn double_quote_escapes() {
        assert_eq!(split_command(r#""say \"hi\" \n""#).unwrap(), vec![r#"say "hi" \n"#]);
    }

    #[test]
    fn backslash_escapes_space() {
        assert_eq!(split_command(r"a\ b c").unwrap(), vec!["a b", "c"]);
    }

    #[test]
    fn unterminated_quote_is_error() {
        assert!(matches!(
            split_command("echo 'oops"),
            Err(EvalError::MalformedCommand(_))
        ));
    }

    #[test]
    fn empty_input_has_no_words() {
        assert!(split_command("   ").unwrap().is_empty());
    }
}
