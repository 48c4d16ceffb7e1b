//! S-expression reader.
//!
//! Turns source text into [`Value`] trees. The reader is purely structural: it
//! never evaluates anything and never consults an environment.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0, multispace1, not_line_ending},
    combinator::{cut, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{pair, preceded, terminated},
};

use crate::ast::{NumberType, Value, sym};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Treat `;` as the start of a comment running to end of line
    pub handle_comments: bool,
    /// Maximum nesting depth of lists, vectors, maps and quotes
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

const CLOSING_DELIMITERS: &[char] = &[')', ']', '}'];

fn is_token_char(c: char) -> bool {
    !matches!(
        c,
        ' ' | '\t' | '\r' | '\n' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';'
    )
}

fn failure(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, code))
}

/// Skip whitespace and, when enabled, line comments
fn skip_ws<'a>(input: &'a str, config: &ParseConfig) -> IResult<&'a str, ()> {
    if config.handle_comments {
        value(
            (),
            many0_count(alt((
                multispace1,
                recognize(pair(char(';'), not_line_ending)),
            ))),
        )
        .parse(input)
    } else {
        value((), multispace0).parse(input)
    }
}

/// Classify a bare token: integer, keyword, boolean, nil or symbol
fn parse_atom(input: &str) -> IResult<&str, Value> {
    let (remaining, token) = take_while1(is_token_char).parse(input)?;

    if let Some(name) = token.strip_prefix(':') {
        if name.is_empty() {
            return Err(failure(input, ErrorKind::Verify));
        }
        return Ok((remaining, Value::Keyword(name.to_owned())));
    }

    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.starts_with(|c: char| c.is_ascii_digit()) {
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(failure(input, ErrorKind::Verify));
        }
        return match token.parse::<NumberType>() {
            Ok(n) => Ok((remaining, Value::Integer(n))),
            Err(_) => Err(failure(input, ErrorKind::Digit)),
        };
    }

    let atom = match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "nil" => Value::Nil,
        _ => Value::Symbol(token.to_owned()),
    };
    Ok((remaining, atom))
}

/// Parse a string literal. Contents pass through untouched; a backslash only
/// stops the following character from closing the string.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (body, _) = char('"').parse(input)?;
    let mut chars = body.char_indices();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => {
                let text = &body[..idx];
                return Ok((&body[idx + 1..], Value::String(text.to_owned())));
            }
            '\\' => {
                if chars.next().is_none() {
                    break;
                }
            }
            _ => {}
        }
    }

    // Unterminated: report at end of input
    Err(failure(&body[body.len()..], ErrorKind::Char))
}

/// Parse the elements between `open` and `close`
fn parse_seq<'a>(
    input: &'a str,
    open: char,
    close: char,
    config: &ParseConfig,
    depth: usize,
) -> IResult<&'a str, Vec<Value>> {
    let (input, _) = char(open).parse(input)?;
    let (input, items) = many0(|i| parse_form(i, config, depth + 1)).parse(input)?;
    let (input, _) = skip_ws(input, config)?;
    let (input, _) = cut(char(close)).parse(input)?;
    Ok((input, items))
}

fn parse_map<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Value> {
    let (remaining, items) = parse_seq(input, '{', '}', config, depth)?;
    if items.len() % 2 != 0 {
        return Err(failure(input, ErrorKind::Count));
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(val)) = (iter.next(), iter.next()) {
        pairs.push((key, val));
    }
    Ok((remaining, Value::Map(pairs)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = cut(|i| parse_form(i, config, depth + 1)).parse(input)?;
    Ok((input, Value::List(vec![sym("quote"), expr])))
}

/// Parse one form, skipping leading whitespace and comments
fn parse_form<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Value> {
    if depth >= config.max_depth {
        return Err(failure(input, ErrorKind::TooLarge));
    }
    preceded(
        |i| skip_ws(i, config),
        alt((
            |i| parse_quote(i, config, depth),
            |i| {
                parse_seq(i, '(', ')', config, depth)
                    .map(|(rest, items)| (rest, Value::List(items)))
            },
            |i| {
                parse_seq(i, '[', ']', config, depth)
                    .map(|(rest, items)| (rest, Value::Vector(items)))
            },
            |i| parse_map(i, config, depth),
            parse_string,
            parse_atom,
        )),
    )
    .parse(input)
}

/// The offending token at `input`: a single delimiter, or a run of token characters
fn found_token(input: &str) -> Option<String> {
    let first = input.chars().next()?;
    if !is_token_char(first) {
        return Some(first.to_string());
    }
    Some(input.chars().take_while(|c| is_token_char(*c)).collect())
}

/// Convert nom parsing errors to structured parse errors
fn to_parse_error(
    input: &str,
    error: nom::Err<nom::error::Error<&str>>,
    config: &ParseConfig,
) -> ParseError {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return ParseError::from_message(ParseErrorKind::Incomplete, "incomplete input");
        }
    };

    let offset = input.len().saturating_sub(e.input.len());
    let (kind, message) = match e.code {
        ErrorKind::TooLarge => (
            ParseErrorKind::TooDeeplyNested,
            format!("expression too deeply nested (max depth: {})", config.max_depth),
        ),
        ErrorKind::Digit => (
            ParseErrorKind::ImplementationLimit,
            "integer literal out of range".to_owned(),
        ),
        ErrorKind::Count => (
            ParseErrorKind::InvalidSyntax,
            "binding map needs an even number of forms".to_owned(),
        ),
        _ if e.input.is_empty() => (
            ParseErrorKind::Incomplete,
            "unexpected end of input".to_owned(),
        ),
        _ if e.input.starts_with(CLOSING_DELIMITERS) => (
            ParseErrorKind::Unbalanced,
            "unexpected closing delimiter".to_owned(),
        ),
        _ => (
            ParseErrorKind::InvalidSyntax,
            "cannot classify token".to_owned(),
        ),
    };

    ParseError::with_context_and_found(kind, message, input, offset, found_token(e.input))
}

fn leftover_error(input: &str, remaining: &str) -> Error {
    let offset = input.len() - remaining.len();
    let (kind, message) = if remaining.starts_with(CLOSING_DELIMITERS) {
        (ParseErrorKind::Unbalanced, "unexpected closing delimiter")
    } else {
        (
            ParseErrorKind::TrailingContent,
            "unexpected input after expression",
        )
    };
    Error::SyntaxError(ParseError::with_context_and_found(
        kind,
        message,
        input,
        offset,
        found_token(remaining),
    ))
}

/// Parse exactly one form from `input` with the default [`ParseConfig`].
pub fn parse(input: &str) -> Result<Value, Error> {
    parse_with_config(input, &ParseConfig::default())
}

/// Parse exactly one form from `input`. Empty input and trailing content are errors.
pub fn parse_with_config(input: &str, config: &ParseConfig) -> Result<Value, Error> {
    match terminated(|i| parse_form(i, config, 0), |i| skip_ws(i, config)).parse(input) {
        Ok(("", form)) => Ok(form),
        Ok((remaining, _)) => Err(leftover_error(input, remaining)),
        Err(e) => Err(Error::SyntaxError(to_parse_error(input, e, config))),
    }
}

/// Parse a sequence of zero or more top-level forms with the default [`ParseConfig`].
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    parse_program_with_config(input, &ParseConfig::default())
}

/// Parse a sequence of zero or more top-level forms.
pub fn parse_program_with_config(input: &str, config: &ParseConfig) -> Result<Vec<Value>, Error> {
    let mut program = preceded(
        |i| skip_ws(i, config),
        many0(terminated(
            |i| parse_form(i, config, 0),
            |i| skip_ws(i, config),
        )),
    );
    match program.parse(input) {
        Ok(("", forms)) => Ok(forms),
        Ok((remaining, _)) => Err(leftover_error(input, remaining)),
        Err(e) => Err(Error::SyntaxError(to_parse_error(input, e, config))),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{kw, list, val, vector};

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),                // Parsing should succeed with this value
        SpecificError(ParseErrorKind), // Parsing should fail with this kind
        AnyError,                      // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            let result = parse(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");
                }
                (Err(_), AnyError) => {}
                (Err(crate::Error::SyntaxError(err)), SpecificError(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind ({err})");
                }
                (Err(err), SpecificError(kind)) => {
                    panic!("{test_id}: expected SyntaxError of kind {kind:?}, got {err:?}");
                }
                (Ok(actual), AnyError | SpecificError(_)) => {
                    panic!("{test_id}: expected error, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error {err:?}");
                }
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_parser_comprehensive() {
        use ParseErrorKind::*;

        let test_cases = vec![
            // ===== INTEGERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("+7", success(7)),
            ("0", success(0)),
            ("9223372036854775807", success(NumberType::MAX)),
            ("-9223372036854775808", success(NumberType::MIN)),
            ("99999999999999999999", SpecificError(ImplementationLimit)),
            ("3.14", SpecificError(InvalidSyntax)),
            ("123abc", SpecificError(InvalidSyntax)),
            ("-42name", SpecificError(InvalidSyntax)),
            // ===== SYMBOLS =====
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("-", success(sym("-"))),
            ("-abc", success(sym("-abc"))),
            (">=", success(sym(">="))),
            ("list?", success(sym("list?"))),
            ("gen-plusX", success(sym("gen-plusX"))),
            ("var123", success(sym("var123"))),
            // ===== KEYWORDS =====
            (":key", success(kw("key"))),
            (":a-b", success(kw("a-b"))),
            (":", SpecificError(InvalidSyntax)),
            // ===== LITERALS =====
            ("true", success(true)),
            ("false", success(false)),
            ("nil", success(Value::Nil)),
            ("nilly", success(sym("nilly"))),
            // ===== STRINGS =====
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            ("\"\"", success("")),
            (r#""a\"b""#, success(r#"a\"b"#)),
            (r#""tab\tstays""#, success(r"tab\tstays")),
            ("\"(not a list)\"", success("(not a list)")),
            ("\"unterminated", SpecificError(Incomplete)),
            (r#""ends with escape\""#, SpecificError(Incomplete)),
            // ===== LISTS =====
            ("()", success(list(vec![]))),
            ("(   )", success(list(vec![]))),
            ("(1 2 3)", success([1, 2, 3])),
            (
                "(+ 1 \"two\" :three)",
                success(list(vec![sym("+"), val(1), val("two"), kw("three")])),
            ),
            ("((1) (2))", success(list(vec![val([1]), val([2])]))),
            ("((1)(2))", success(list(vec![val([1]), val([2])]))),
            ("(((1)))", success(list(vec![list(vec![val([1])])]))),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            // ===== VECTORS =====
            ("[]", success(vector(vec![]))),
            ("[a b]", success(vector(vec![sym("a"), sym("b")]))),
            (
                "(fn [x] (+ x 1))",
                success(list(vec![
                    sym("fn"),
                    vector(vec![sym("x")]),
                    list(vec![sym("+"), sym("x"), val(1)]),
                ])),
            ),
            // ===== BINDING MAPS =====
            ("{}", success(Value::Map(vec![]))),
            (
                "{p 1 q (+ p 1)}",
                success(Value::Map(vec![
                    (sym("p"), val(1)),
                    (sym("q"), list(vec![sym("+"), sym("p"), val(1)])),
                ])),
            ),
            ("{p 1 q}", SpecificError(InvalidSyntax)),
            // ===== QUOTE =====
            ("'foo", success(list(vec![sym("quote"), sym("foo")]))),
            ("'(1 2)", success(list(vec![sym("quote"), val([1, 2])]))),
            (
                "''a",
                success(list(vec![
                    sym("quote"),
                    list(vec![sym("quote"), sym("a")]),
                ])),
            ),
            ("'", SpecificError(Incomplete)),
            // ===== COMMENTS AND WHITESPACE =====
            ("  42  ", success(42)),
            ("\r\n  foo  \t", success(sym("foo"))),
            ("; leading\n42", success(42)),
            ("42 ; trailing", success(42)),
            ("(1 ; inside\n 2)", success([1, 2])),
            // ===== BALANCE ERRORS =====
            ("(1 2 3", SpecificError(Incomplete)),
            ("((1 2)", SpecificError(Incomplete)),
            ("[1 2", SpecificError(Incomplete)),
            (")", SpecificError(Unbalanced)),
            ("(1 2))", SpecificError(Unbalanced)),
            ("(1 2]", SpecificError(Unbalanced)),
            ("[1 2)", SpecificError(Unbalanced)),
            ("{a 1)", SpecificError(Unbalanced)),
            // ===== INPUT SHAPE =====
            ("", SpecificError(Incomplete)),
            ("   ", SpecificError(Incomplete)),
            ("; only a comment", SpecificError(Incomplete)),
            ("1 2", SpecificError(TrailingContent)),
            ("(+ 1 2) (+ 3 4)", SpecificError(TrailingContent)),
            ("(1 2abc)", AnyError),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parse_program() {
        let test_cases: Vec<(&str, Option<Vec<Value>>)> = vec![
            ("", Some(vec![])),
            ("  ; nothing here\n", Some(vec![])),
            ("1", Some(vec![val(1)])),
            ("1 2 3", Some(vec![val(1), val(2), val(3)])),
            (
                "(set a 1) (+ a 1)",
                Some(vec![
                    list(vec![sym("set"), sym("a"), val(1)]),
                    list(vec![sym("+"), sym("a"), val(1)]),
                ]),
            ),
            ("(a)(b)", Some(vec![list(vec![sym("a")]), list(vec![sym("b")])])),
            ("1 )", None),
            ("(1", None),
            ("1 \"open", None),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let result = parse_program(input);
            match expected {
                Some(forms) => assert_eq!(result.unwrap(), forms, "Program test #{}", i + 1),
                None => assert!(result.is_err(), "Program test #{} should fail", i + 1),
            }
        }
    }

    #[test]
    fn test_comments_can_be_disabled() {
        let config = ParseConfig {
            handle_comments: false,
            ..ParseConfig::default()
        };
        assert_eq!(parse_with_config("42", &config).unwrap(), val(42));
        assert!(parse_with_config("42 ; note", &config).is_err());
        assert!(parse_with_config("(1 ; note\n 2)", &config).is_err());
    }

    #[test]
    fn test_parse_error_details() {
        let Err(crate::Error::SyntaxError(err)) = parse("(+ 1 2))") else {
            panic!("expected a syntax error");
        };
        assert_eq!(err.kind, ParseErrorKind::Unbalanced);
        assert_eq!(err.found.as_deref(), Some(")"));
        assert!(err.context.is_some());

        let Err(crate::Error::SyntaxError(err)) = parse("(list 12x)") else {
            panic!("expected a syntax error");
        };
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.found.as_deref(), Some("12x"));

        let rendered = crate::Error::SyntaxError(err).to_string();
        assert!(rendered.starts_with("SyntaxError: "), "{rendered}");
        assert!(rendered.contains("Found: 12x"), "{rendered}");
    }

    #[test]
    fn test_parser_depth_limits() {
        let parens_under_limit = format!(
            "{}unbound{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let quotes_under_limit = format!("{}unbound", "'".repeat(MAX_PARSE_DEPTH - 1));
        let deep_parens_at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        let deep_quotes_at_limit = format!("{}a", "'".repeat(MAX_PARSE_DEPTH));
        let deep_vectors_at_limit = format!(
            "{}1{}",
            "[".repeat(MAX_PARSE_DEPTH),
            "]".repeat(MAX_PARSE_DEPTH)
        );

        run_parse_tests(vec![
            (
                deep_parens_at_limit.as_str(),
                SpecificError(ParseErrorKind::TooDeeplyNested),
            ),
            (
                deep_quotes_at_limit.as_str(),
                SpecificError(ParseErrorKind::TooDeeplyNested),
            ),
            (
                deep_vectors_at_limit.as_str(),
                SpecificError(ParseErrorKind::TooDeeplyNested),
            ),
        ]);

        assert!(
            parse(&parens_under_limit).is_ok(),
            "Parens just under depth limit should parse successfully"
        );
        assert!(
            parse(&quotes_under_limit).is_ok(),
            "Quotes just under depth limit should parse successfully"
        );

        let shallow = ParseConfig {
            max_depth: 2,
            ..ParseConfig::default()
        };
        assert!(parse_with_config("(1)", &shallow).is_ok());
        assert!(parse_with_config("((1))", &shallow).is_err());
    }
}
