//! Script-visible list formatting
//!
//! Results that carry several values (member enumerations, info key/value
//! lists, array values) are rendered as brace-quoted word lists, and array
//! arguments are parsed back from the same syntax.

/// Quote one list element if it would not survive word splitting
pub fn quote_element(element: &str) -> String {
    let needs_braces = element.is_empty()
        || element.chars().any(|c| {
            c.is_whitespace() || matches!(c, '{' | '}' | '"' | '\\' | ';' | '[' | ']' | '$')
        });
    if !needs_braces {
        return element.to_string();
    }
    if braces_balanced(element) && !element.ends_with('\\') {
        return format!("{{{}}}", element);
    }
    let mut escaped = String::with_capacity(element.len() + 8);
    for c in element.chars() {
        match c {
            '{' | '}' | '"' | '\\' | '[' | ']' | '$' | ';' | ' ' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Join elements into a list string
pub fn format_list<I, S>(elements: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    elements
        .into_iter()
        .map(|e| quote_element(e.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render key/value pairs as a flat list
pub fn format_pairs(pairs: &[(&str, String)]) -> String {
    format_list(
        pairs
            .iter()
            .flat_map(|(k, v)| [k.to_string(), v.clone()]),
    )
}

/// Split a list string into its elements
pub fn parse_list(text: &str) -> Result<Vec<String>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut elements = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let mut element = String::new();
        match chars[i] {
            '{' => {
                let mut depth = 1;
                i += 1;
                while i < chars.len() {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    element.push(chars[i]);
                    i += 1;
                }
                if depth != 0 {
                    return Err("unmatched open brace in list".to_string());
                }
                i += 1;
                if i < chars.len() && !chars[i].is_whitespace() {
                    return Err("list element in braces followed by extra characters".to_string());
                }
            }
            '"' => {
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    match chars[i] {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' if i + 1 < chars.len() => {
                            i += 1;
                            element.push(unescape(chars[i]));
                        }
                        c => element.push(c),
                    }
                    i += 1;
                }
                if !closed {
                    return Err("unmatched open quote in list".to_string());
                }
                i += 1;
            }
            _ => {
                while i < chars.len() && !chars[i].is_whitespace() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 1;
                        element.push(unescape(chars[i]));
                    } else {
                        element.push(chars[i]);
                    }
                    i += 1;
                }
            }
        }
        elements.push(element);
    }
    Ok(elements)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote_element("abc"), "abc");
        assert_eq!(quote_element(""), "{}");
        assert_eq!(quote_element("a b"), "{a b}");
    }

    #[test]
    fn test_quote_unbalanced() {
        assert_eq!(quote_element("a{b c"), "a\\{b\\ c");
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(["x", "y z", ""]), "x {y z} {}");
        assert_eq!(
            format_pairs(&[("module", "libc.so.6".to_string()), ("flags", "None".to_string())]),
            "module libc.so.6 flags None"
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("1 {2 3} \"4 5\"  six").unwrap(),
            vec!["1", "2 3", "4 5", "six"]
        );
        assert_eq!(parse_list("   ").unwrap(), Vec::<String>::new());
        assert_eq!(parse_list("a\\ b").unwrap(), vec!["a b"]);
    }

    #[test]
    fn test_parse_list_errors() {
        assert!(parse_list("{abc").is_err());
        assert!(parse_list("\"abc").is_err());
        assert!(parse_list("{a}b").is_err());
    }

    #[test]
    fn test_parse_quoted_roundtrip() {
        let items = ["plain", "with space", "", "brace{d}"];
        let text = format_list(items);
        assert_eq!(parse_list(&text).unwrap(), items);
    }
}
