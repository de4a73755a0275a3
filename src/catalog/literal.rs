//! Parsing of list cells stored as Python-style literals, e.g.
//! `['Light rum', "Lime's juice", 'Soda water']`.

/// Parse a bracketed list of quoted strings. Returns `None` if `input` is not
/// a well-formed list literal.
pub fn parse_list(input: &str) -> Option<Vec<String>> {
    let mut chars = input.trim().chars().peekable();
    if chars.next()? != '[' {
        return None;
    }

    let mut items = Vec::new();
    loop {
        skip_whitespace(&mut chars);
        match chars.next()? {
            ']' if items.is_empty() => break,
            quote @ ('\'' | '"') => items.push(parse_quoted(&mut chars, quote)?),
            _ => return None,
        }

        skip_whitespace(&mut chars);
        match chars.next()? {
            ',' => {
                // trailing comma: `['a', ]`
                skip_whitespace(&mut chars);
                if chars.peek() == Some(&']') {
                    chars.next();
                    break;
                }
            }
            ']' => break,
            _ => return None,
        }
    }

    skip_whitespace(&mut chars);
    chars.next().is_none().then_some(items)
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn parse_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        match chars.next()? {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c if c == quote => return Some(out),
            c => out.push(c),
        }
    }
}
