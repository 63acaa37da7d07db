//! Lexer: splits template source into text runs and tokenized actions.
//!
//! Handles `{{- ` / ` -}}` whitespace trimming and `{{/* */}}` comments
//! here, so the parser only ever sees text and action items.

use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tok {
    Ident(String),
    Field(String),
    Dot,
    Str(String),
    Int(i64),
    Pipe,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: Tok,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    Text(String),
    Action { tokens: Vec<Token>, offset: usize },
}

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// `-` followed by one whitespace character, directly after `{{`.
fn has_left_trim(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(is_trim_space)
}

/// One whitespace character followed by `-}}`.
fn has_right_trim(s: &str) -> bool {
    s.chars().next().is_some_and(is_trim_space) && s[1..].starts_with("-}}")
}

/// Length in bytes of a right-trim close sequence (space, `-`, `}}`).
const RIGHT_TRIM_CLOSE: usize = 4;

pub(crate) fn lex(src: &str) -> TemplateResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    loop {
        let Some(rel) = src[pos..].find(LEFT_DELIM) else {
            push_text(&mut items, &src[pos..], trim_next, false);
            return Ok(items);
        };
        let open = pos + rel;
        let mut inner = open + LEFT_DELIM.len();
        let trim_left = has_left_trim(&src[inner..]);
        push_text(&mut items, &src[pos..open], trim_next, trim_left);
        if trim_left {
            inner += 2;
        }

        let (end, trim_right) = if src[inner..].starts_with("/*") {
            lex_comment(src, open, inner)?
        } else {
            let (tokens, end, trim_right) = lex_action(src, open, inner)?;
            items.push(Item::Action {
                tokens,
                offset: open,
            });
            (end, trim_right)
        };
        pos = end;
        trim_next = trim_right;
    }
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start_matches(is_trim_space);
    }
    if trim_end {
        text = text.trim_end_matches(is_trim_space);
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

fn lex_comment(src: &str, open: usize, start: usize) -> TemplateResult<(usize, bool)> {
    let Some(rel) = src[start..].find("*/") else {
        return Err(TemplateError::syntax(open, "unclosed comment"));
    };
    let after = start + rel + 2;
    let rest = &src[after..];
    if rest.starts_with(RIGHT_DELIM) {
        Ok((after + RIGHT_DELIM.len(), false))
    } else if has_right_trim(rest) {
        Ok((after + RIGHT_TRIM_CLOSE, true))
    } else {
        Err(TemplateError::syntax(
            after,
            "comment ends before closing delimiter",
        ))
    }
}

fn lex_action(
    src: &str,
    open: usize,
    start: usize,
) -> TemplateResult<(Vec<Token>, usize, bool)> {
    let mut tokens = Vec::new();
    let mut i = start;

    loop {
        let rest = &src[i..];
        let Some(c) = rest.chars().next() else {
            return Err(TemplateError::syntax(open, "unclosed action"));
        };
        if rest.starts_with(RIGHT_DELIM) {
            return Ok((tokens, i + RIGHT_DELIM.len(), false));
        }
        if is_trim_space(c) {
            if has_right_trim(rest) {
                return Ok((tokens, i + RIGHT_TRIM_CLOSE, true));
            }
            i += 1;
            continue;
        }

        let (kind, len) = match c {
            '|' => (Tok::Pipe, 1),
            '(' => (Tok::LParen, 1),
            ')' => (Tok::RParen, 1),
            '"' => {
                let (s, len) = lex_quoted(rest, i)?;
                (Tok::Str(s), len)
            }
            '`' => {
                let Some(close) = rest[1..].find('`') else {
                    return Err(TemplateError::syntax(i, "unterminated raw quoted string"));
                };
                (Tok::Str(rest[1..1 + close].to_string()), close + 2)
            }
            '\'' => {
                let (ch, len) = lex_char(rest, i)?;
                (Tok::Int(i64::from(u32::from(ch))), len)
            }
            '.' => lex_dot(rest, i)?,
            '$' => return Err(TemplateError::syntax(i, "variables are not supported")),
            '-' | '+' if rest[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                lex_number(rest, i)?
            }
            d if d.is_ascii_digit() => lex_number(rest, i)?,
            a if a.is_alphabetic() || a == '_' => {
                let len = ident_len(rest);
                (Tok::Ident(rest[..len].to_string()), len)
            }
            other => {
                return Err(TemplateError::syntax(
                    i,
                    format!("unexpected {other:?} in action"),
                ));
            }
        };
        tokens.push(Token { kind, offset: i });
        i += len;
    }
}

fn ident_len(s: &str) -> usize {
    s.char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map_or(s.len(), |(idx, _)| idx)
}

fn lex_dot(rest: &str, offset: usize) -> TemplateResult<(Tok, usize)> {
    let after = &rest[1..];
    match after.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            let len = ident_len(after);
            let tail = &after[len..];
            if tail.starts_with('.') && tail[1..].starts_with(|c: char| c.is_alphabetic()) {
                return Err(TemplateError::syntax(
                    offset,
                    "nested fields are not supported; context fields are strings",
                ));
            }
            Ok((Tok::Field(after[..len].to_string()), len + 1))
        }
        Some(c) if c.is_ascii_digit() => Err(TemplateError::syntax(
            offset,
            "floating-point numbers are not supported",
        )),
        _ => Ok((Tok::Dot, 1)),
    }
}

fn lex_number(rest: &str, offset: usize) -> TemplateResult<(Tok, usize)> {
    let (negative, digits_start) = match rest.as_bytes()[0] {
        b'-' => (true, 1),
        b'+' => (false, 1),
        _ => (false, 0),
    };
    let len = digits_start
        + rest[digits_start..]
            .char_indices()
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .map_or(rest.len() - digits_start, |(idx, _)| idx);
    let text = rest[digits_start..len].replace('_', "");
    let bad = || TemplateError::syntax(offset, format!("bad number syntax: {:?}", &rest[..len]));

    if text.contains('.') {
        return Err(TemplateError::syntax(
            offset,
            "floating-point numbers are not supported",
        ));
    }
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() {
        return Err(bad());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| bad())?;
    let value = if negative { -magnitude } else { magnitude };
    Ok((Tok::Int(value), len))
}

/// Lex a `"…"` string starting at `rest[0]`; returns the value and the
/// number of source bytes consumed.
fn lex_quoted(rest: &str, offset: usize) -> TemplateResult<(String, usize)> {
    let mut out = String::new();
    let mut i = 1;
    while let Some(c) = rest[i..].chars().next() {
        match c {
            '"' => return Ok((out, i + 1)),
            '\n' => break,
            '\\' => {
                let (ch, consumed) = unescape(&rest[i + 1..], offset + i)?;
                out.push(ch);
                i += 1 + consumed;
            }
            other => {
                out.push(other);
                i += other.len_utf8();
            }
        }
    }
    Err(TemplateError::syntax(offset, "unterminated quoted string"))
}

/// Lex a `'x'` character constant.
fn lex_char(rest: &str, offset: usize) -> TemplateResult<(char, usize)> {
    let body = &rest[1..];
    let (ch, consumed) = match body.chars().next() {
        Some('\\') => {
            let (ch, consumed) = unescape(&body[1..], offset + 1)?;
            (ch, consumed + 1)
        }
        Some('\'') | Some('\n') | None => {
            return Err(TemplateError::syntax(offset, "malformed character constant"));
        }
        Some(c) => (c, c.len_utf8()),
    };
    if !body[consumed..].starts_with('\'') {
        return Err(TemplateError::syntax(offset, "malformed character constant"));
    }
    Ok((ch, consumed + 2))
}

/// Decode one escape sequence; `s` starts right after the backslash.
/// Returns the character and the number of bytes consumed from `s`.
fn unescape(s: &str, offset: usize) -> TemplateResult<(char, usize)> {
    let bad = || TemplateError::syntax(offset, "invalid escape sequence");
    let Some(c) = s.chars().next() else {
        return Err(bad());
    };
    let simple = match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'a' => Some('\u{7}'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    };
    if let Some(ch) = simple {
        return Ok((ch, 1));
    }
    let width = match c {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        _ => return Err(bad()),
    };
    let hex = s.get(1..1 + width).ok_or_else(bad)?;
    let code = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
    if c == 'x' && code > 0x7f {
        return Err(TemplateError::syntax(
            offset,
            "\\x escapes above 0x7f would produce invalid UTF-8",
        ));
    }
    let ch = char::from_u32(code).ok_or_else(bad)?;
    Ok((ch, 1 + width))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        let items = lex(src).unwrap();
        match &items[..] {
            [Item::Action { tokens, .. }] => tokens.iter().map(|t| t.kind.clone()).collect(),
            other => panic!("expected a single action, got {other:?}"),
        }
    }

    #[test]
    fn splits_text_and_actions() {
        let items = lex("a-{{.Seq}}-b").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Item::Text("a-".into()));
        assert_eq!(items[2], Item::Text("-b".into()));
    }

    #[test]
    fn lexes_pipeline_tokens() {
        assert_eq!(
            kinds(r#"{{ .GroupId | replace "-" "_" -1 }}"#),
            vec![
                Tok::Field("GroupId".into()),
                Tok::Pipe,
                Tok::Ident("replace".into()),
                Tok::Str("-".into()),
                Tok::Str("_".into()),
                Tok::Int(-1),
            ]
        );
    }

    #[test]
    fn trim_markers_eat_adjacent_whitespace() {
        let items = lex("a  {{- .Seq -}}\n  b").unwrap();
        assert_eq!(items[0], Item::Text("a".into()));
        assert_eq!(items[2], Item::Text("b".into()));
    }

    #[test]
    fn dash_without_space_is_a_number() {
        assert_eq!(kinds("{{-3}}"), vec![Tok::Int(-3)]);
    }

    #[test]
    fn comments_are_dropped() {
        let items = lex("x{{/* note */}}y").unwrap();
        assert_eq!(items, vec![Item::Text("x".into()), Item::Text("y".into())]);
    }

    #[test]
    fn string_escapes_and_raw_strings() {
        assert_eq!(
            kinds(r#"{{ "a\tbé" `r\n` }}"#),
            vec![Tok::Str("a\tbé".into()), Tok::Str("r\\n".into())]
        );
    }

    #[test]
    fn character_constants_are_ints() {
        assert_eq!(kinds("{{ 'a' '\\n' }}"), vec![Tok::Int(97), Tok::Int(10)]);
    }

    #[test]
    fn number_radixes() {
        assert_eq!(kinds("{{ 0x1f 010 1_000 }}"), vec![Tok::Int(31), Tok::Int(8), Tok::Int(1000)]);
    }

    #[test]
    fn rejects_unclosed_action() {
        let err = lex("abc {{ .Seq").unwrap_err();
        assert_eq!(err, TemplateError::syntax(4, "unclosed action"));
    }

    #[test]
    fn rejects_variables_and_floats() {
        assert!(lex("{{ $x }}").is_err());
        assert!(lex("{{ 1.5 }}").is_err());
        assert!(lex("{{ .GroupId.Name }}").is_err());
    }

    #[test]
    fn rejects_unterminated_strings() {
        assert!(lex("{{ \"abc }}").is_err());
        assert!(lex("{{ `abc }}").is_err());
    }
}
