//! A parser for nexl string templates and the expressions embedded in them.
//!
//! The grammar is context-sensitive (templates nest inside expressions which
//! nest inside templates), so the structure-level parsing is a recursive
//! descent over `&str` slices, with `nom` combinators handling the token
//! level (integers, codes, whitespace).

use std::collections::BTreeMap;

use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{i64 as nom_i64, multispace0},
};

use crate::ast::{
    Action, ArrayOpCode, CastKind, Chunk, ChunkTemplate, ExpressionMd, IndexBound, IndexRange,
    StringOpCode, TransformCode,
};
use crate::error::ParseError;

/// Characters that terminate a template embedded in an expression. Each one
/// introduces an action, closes the expression, or is reserved for a future
/// action; none are literal text unless escaped.
const ACTION_CHARS: &[char] = &[
    '.', '[', ']', '(', ')', '@', ':', '~', '<', '#', '-', '+', '&', '^', '!', '*', '}', ',', '%',
    '?', '=', '|', ';',
];

/// Action characters set aside for future use. They parse into
/// [`Action::Reserved`] and the evaluator rejects them.
const RESERVED_CHARS: &[char] = &['%', '?', '=', '|', ';'];

/// Parses a whole source string into a chunk template.
///
/// Literal text is kept verbatim; every `${...}` becomes a placeholder cell
/// with its parsed expression registered at the cell's index. A backslash
/// escapes the following character.
pub fn parse_template(input: &str) -> Result<ChunkTemplate, ParseError> {
    let (rest, template) = template(input, &[])?;
    debug_assert!(rest.is_empty());
    Ok(template)
}

/// Parses a single `${...}` expression into its action-list metadata.
pub fn parse_expression(input: &str) -> Result<ExpressionMd, ParseError> {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix("${") else {
        return Err(ParseError::syntax(
            input,
            "an expression must be enclosed in ${ and }",
        ));
    };
    let (rest, md) = expression_body(body, input)?;
    let rest = rest.strip_prefix('}').ok_or(ParseError::Unterminated {
        expression: input.to_string(),
    })?;
    if !rest.is_empty() {
        return Err(ParseError::syntax(
            input,
            format!("unexpected trailing text [{rest}] after expression"),
        ));
    }
    Ok(md)
}

/// Scans literal text up to one of `stops` (unescaped), collecting embedded
/// `${...}` expressions as placeholders. Returns the unconsumed remainder.
fn template<'a>(
    input: &'a str,
    stops: &[char],
) -> Result<(&'a str, ChunkTemplate), ParseError> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut substitutions: BTreeMap<usize, ExpressionMd> = BTreeMap::new();
    let mut literal = String::new();
    let mut rest = input;

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => break,
            Some('\\') => {
                // Escaped character, taken verbatim. A trailing backslash
                // stays a backslash.
                match chars.next() {
                    Some(c) => {
                        literal.push(c);
                        rest = &rest[1 + c.len_utf8()..];
                    }
                    None => {
                        literal.push('\\');
                        rest = "";
                    }
                }
            }
            Some('$') if rest.starts_with("${") => {
                if !literal.is_empty() {
                    chunks.push(Chunk::Literal(std::mem::take(&mut literal)));
                }
                let (after, md) = expression_body(&rest[2..], input)?;
                rest = after.strip_prefix('}').ok_or(ParseError::Unterminated {
                    expression: input.to_string(),
                })?;
                substitutions.insert(chunks.len(), md);
                chunks.push(Chunk::Placeholder);
            }
            Some(c) if stops.contains(&c) => break,
            Some(c) => {
                literal.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    if !literal.is_empty() || chunks.is_empty() {
        chunks.push(Chunk::Literal(literal));
    }

    let consumed = &input[..input.len() - rest.len()];
    Ok((
        rest,
        ChunkTemplate {
            chunks,
            substitutions,
            str: consumed.to_string(),
        },
    ))
}

/// Parses the action list of an expression, stopping before the closing `}`.
/// `source` is the enclosing source text, used for diagnostics.
fn expression_body<'a>(
    input: &'a str,
    source: &str,
) -> Result<(&'a str, ExpressionMd), ParseError> {
    let mut actions: Vec<Action> = Vec::new();
    let mut rest = input;

    loop {
        let Some(c) = rest.chars().next() else {
            return Err(ParseError::Unterminated {
                expression: source.to_string(),
            });
        };

        match c {
            '}' => break,
            '.' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::PropertyResolution(tmpl));
                rest = after;
            }
            '[' => {
                let (after, ranges) = index_ranges(&rest[1..], source)?;
                actions.push(Action::ArrayIndex(ranges));
                rest = after;
            }
            '(' => {
                let (after, params) = function_params(&rest[1..], source)?;
                actions.push(Action::Function(params));
                rest = after;
            }
            '@' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::DefValue(tmpl));
                rest = after;
            }
            ':' => {
                let (after, kind) = cast_kind(&rest[1..], source)?;
                actions.push(Action::Cast(kind));
                rest = after;
            }
            '~' => {
                let (after, code) = transform_code(&rest[1..], source)?;
                actions.push(Action::Transformations(code));
                rest = after;
            }
            '<' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::ObjectReverseResolution(tmpl));
                rest = after;
            }
            '#' => {
                let (after, code) = array_op_code(&rest[1..], source)?;
                actions.push(Action::ArrayOperations(code));
                rest = after;
            }
            '-' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::EliminateArrayElements(tmpl));
                rest = after;
            }
            '+' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::AppendToArray(tmpl));
                rest = after;
            }
            '&' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                actions.push(Action::JoinArrayElements(tmpl));
                rest = after;
            }
            '^' => {
                let (after, code) = string_op_code(&rest[1..], source)?;
                actions.push(Action::StringOperations(code));
                rest = after;
            }
            '!' => {
                actions.push(Action::EvaluateAsUndefined);
                rest = &rest[1..];
            }
            '*' => {
                let (after, tmpl) = template(&rest[1..], ACTION_CHARS)?;
                let custom = if tmpl.is_empty_literal() { None } else { Some(tmpl) };
                actions.push(Action::MandatoryValue(custom));
                rest = after;
            }
            c if RESERVED_CHARS.contains(&c) => {
                actions.push(Action::Reserved(c));
                rest = &rest[c.len_utf8()..];
            }
            _ if actions.is_empty() => {
                // The leading dot-less property key of the expression.
                let (after, tmpl) = template(rest, ACTION_CHARS)?;
                actions.push(Action::PropertyResolution(tmpl));
                rest = after;
            }
            _ => {
                // Unknown action character: kept as metadata so the
                // evaluator can raise the reserved-action error with the
                // full expression text.
                actions.push(Action::Reserved(c));
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    let consumed = &input[..input.len() - rest.len()];
    Ok((
        rest,
        ExpressionMd {
            actions,
            str: format!("${{{consumed}}}"),
        },
    ))
}

/// `[` bound (`..` bound)? (`,` ...)* `]` - the leading `[` is already
/// consumed by the caller.
fn index_ranges<'a>(
    input: &'a str,
    source: &str,
) -> Result<(&'a str, Vec<IndexRange>), ParseError> {
    let mut ranges = Vec::new();
    let mut rest = skip_ws(input);

    loop {
        let (after, min) = index_bound(rest, source)?;
        rest = skip_ws(after);

        let max = if let Ok((after, _)) = tag::<_, _, nom::error::Error<&str>>("..").parse(rest) {
            let (after, max) = index_bound(skip_ws(after), source)?;
            rest = skip_ws(after);
            max
        } else {
            min.clone()
        };
        ranges.push(IndexRange { min, max });

        if let Some(after) = rest.strip_prefix(',') {
            rest = skip_ws(after);
            continue;
        }
        let Some(after) = rest.strip_prefix(']') else {
            return Err(ParseError::syntax(
                source,
                "expected ',' or ']' in array index action",
            ));
        };
        return Ok((after, ranges));
    }
}

fn index_bound<'a>(input: &'a str, source: &str) -> Result<(&'a str, IndexBound), ParseError> {
    if let Some(rest) = input.strip_prefix('^') {
        return Ok((rest, IndexBound::First));
    }
    if input.starts_with("${") {
        let (after, md) = expression_body(&input[2..], source)?;
        let after = after.strip_prefix('}').ok_or(ParseError::Unterminated {
            expression: source.to_string(),
        })?;
        return Ok((after, IndexBound::Expr(Box::new(md))));
    }
    if let Some(rest) = input.strip_prefix('$') {
        return Ok((rest, IndexBound::Last));
    }
    match nom_i64::<_, nom::error::Error<&str>>(input) {
        Ok((rest, n)) => Ok((rest, IndexBound::Literal(n))),
        Err(_) => Err(ParseError::syntax(
            source,
            "array index bound must be an integer, '^', '$' or a nested expression",
        )),
    }
}

/// `(` param (`,` param)* `)` - the leading `(` is already consumed.
///
/// A parameter is either a nested `${...}` expression or bare literal text;
/// the latter is represented as a default-value-only expression, which is the
/// action machine's way of producing a literal.
fn function_params<'a>(
    input: &'a str,
    source: &str,
) -> Result<(&'a str, Vec<ExpressionMd>), ParseError> {
    let mut params = Vec::new();
    let mut rest = skip_ws(input);

    if let Some(after) = rest.strip_prefix(')') {
        return Ok((after, params));
    }

    loop {
        if rest.starts_with("${") {
            let (after, md) = expression_body(&rest[2..], source)?;
            let after = after.strip_prefix('}').ok_or(ParseError::Unterminated {
                expression: source.to_string(),
            })?;
            params.push(md);
            rest = skip_ws(after);
        } else {
            let (after, tmpl) = template(rest, &[',', ')'])?;
            let str = format!("${{@{}}}", tmpl.str);
            params.push(ExpressionMd {
                actions: vec![Action::DefValue(tmpl)],
                str,
            });
            rest = skip_ws(after);
        }

        if let Some(after) = rest.strip_prefix(',') {
            rest = skip_ws(after);
            continue;
        }
        let Some(after) = rest.strip_prefix(')') else {
            return Err(ParseError::syntax(
                source,
                "expected ',' or ')' in function action",
            ));
        };
        return Ok((after, params));
    }
}

fn cast_kind<'a>(input: &'a str, source: &str) -> Result<(&'a str, CastKind), ParseError> {
    for (token, kind) in [
        ("str", CastKind::Str),
        ("num", CastKind::Num),
        ("bool", CastKind::Bool),
    ] {
        if let Some(rest) = input.strip_prefix(token) {
            return Ok((rest, kind));
        }
    }
    Err(ParseError::syntax(
        source,
        "cast action must be one of :str, :num, :bool",
    ))
}

fn transform_code<'a>(input: &'a str, source: &str) -> Result<(&'a str, TransformCode), ParseError> {
    let code = match input.chars().next() {
        Some('A') => TransformCode::WrapArray,
        Some('O') => TransformCode::WrapObject,
        Some('K') => TransformCode::Keys,
        Some('V') => TransformCode::Values,
        Some('P') => TransformCode::KeyValueLines,
        Some('X') => TransformCode::Xml,
        Some('Y') => TransformCode::Yaml,
        _ => {
            return Err(ParseError::syntax(
                source,
                "transformation action must be one of ~A, ~O, ~K, ~V, ~P, ~X, ~Y",
            ));
        }
    };
    Ok((&input[1..], code))
}

fn array_op_code<'a>(input: &'a str, source: &str) -> Result<(&'a str, ArrayOpCode), ParseError> {
    for (token, code) in [
        ("LEN", ArrayOpCode::Length),
        ("S", ArrayOpCode::SortAsc),
        ("s", ArrayOpCode::SortDesc),
        ("U", ArrayOpCode::Uniq),
        ("D", ArrayOpCode::Duplicates),
    ] {
        if let Some(rest) = input.strip_prefix(token) {
            return Ok((rest, code));
        }
    }
    Err(ParseError::syntax(
        source,
        "array operation must be one of #S, #s, #U, #D, #LEN",
    ))
}

fn string_op_code<'a>(input: &'a str, source: &str) -> Result<(&'a str, StringOpCode), ParseError> {
    for (token, code) in [
        ("U1", StringOpCode::UpperFirst),
        ("U", StringOpCode::Upper),
        ("LEN", StringOpCode::Length),
        ("L", StringOpCode::Lower),
        ("T", StringOpCode::Trim),
    ] {
        if let Some(rest) = input.strip_prefix(token) {
            return Ok((rest, code));
        }
    }
    Err(ParseError::syntax(
        source,
        "string operation must be one of ^U, ^U1, ^L, ^LEN, ^T",
    ))
}

fn skip_ws(input: &str) -> &str {
    let result: IResult<&str, &str> = multispace0(input);
    match result {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_key(action: &Action) -> &str {
        match action {
            Action::PropertyResolution(t) => match t.chunks.as_slice() {
                [Chunk::Literal(s)] => s,
                other => panic!("expected one literal chunk, got {other:?}"),
            },
            other => panic!("expected property resolution, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_is_one_literal_chunk() {
        let t = parse_template("hello world").unwrap();
        assert_eq!(t.chunks, vec![Chunk::Literal("hello world".into())]);
        assert!(t.substitutions.is_empty());
    }

    #[test]
    fn test_empty_text_is_one_empty_literal_chunk() {
        let t = parse_template("").unwrap();
        assert_eq!(t.chunks, vec![Chunk::Literal(String::new())]);
    }

    #[test]
    fn test_whole_template_expression_is_single_placeholder() {
        let t = parse_template("${hosts}").unwrap();
        assert_eq!(t.chunks, vec![Chunk::Placeholder]);
        assert_eq!(t.substitutions.len(), 1);
        assert_eq!(single_key(&t.substitutions[&0].actions[0]), "hosts");
    }

    #[test]
    fn test_mixed_template_positions() {
        let t = parse_template("a ${x} b ${y}").unwrap();
        assert_eq!(t.chunks.len(), 4);
        assert_eq!(t.chunks[0], Chunk::Literal("a ".into()));
        assert_eq!(t.chunks[1], Chunk::Placeholder);
        assert_eq!(t.chunks[2], Chunk::Literal(" b ".into()));
        assert_eq!(t.chunks[3], Chunk::Placeholder);
        assert_eq!(t.substitutions.keys().copied().collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let t = parse_template(r"cost: \${5}").unwrap();
        assert_eq!(t.chunks, vec![Chunk::Literal("cost: ${5}".into())]);
    }

    #[test]
    fn test_property_chain() {
        let md = parse_expression("${hosts.prod.name}").unwrap();
        assert_eq!(md.actions.len(), 3);
        assert_eq!(single_key(&md.actions[0]), "hosts");
        assert_eq!(single_key(&md.actions[1]), "prod");
        assert_eq!(single_key(&md.actions[2]), "name");
        assert_eq!(md.str, "${hosts.prod.name}");
    }

    #[test]
    fn test_nested_expression_in_key() {
        let md = parse_expression("${hosts.${env}}").unwrap();
        assert_eq!(md.actions.len(), 2);
        let Action::PropertyResolution(t) = &md.actions[1] else {
            panic!("expected property resolution");
        };
        assert_eq!(t.chunks, vec![Chunk::Placeholder]);
        assert_eq!(single_key(&t.substitutions[&0].actions[0]), "env");
    }

    #[test]
    fn test_empty_expression_has_no_actions() {
        let md = parse_expression("${}").unwrap();
        assert!(md.actions.is_empty());
    }

    #[test]
    fn test_index_ranges() {
        let md = parse_expression("${list[0, 2..4, ^..$, -1]}").unwrap();
        let Action::ArrayIndex(ranges) = &md.actions[1] else {
            panic!("expected array index");
        };
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].min, IndexBound::Literal(0));
        assert_eq!(ranges[0].max, IndexBound::Literal(0));
        assert_eq!(ranges[1].min, IndexBound::Literal(2));
        assert_eq!(ranges[1].max, IndexBound::Literal(4));
        assert_eq!(ranges[2].min, IndexBound::First);
        assert_eq!(ranges[2].max, IndexBound::Last);
        assert_eq!(ranges[3].min, IndexBound::Literal(-1));
    }

    #[test]
    fn test_index_with_nested_expression() {
        let md = parse_expression("${list[${idx}]}").unwrap();
        let Action::ArrayIndex(ranges) = &md.actions[1] else {
            panic!("expected array index");
        };
        assert!(matches!(ranges[0].min, IndexBound::Expr(_)));
    }

    #[test]
    fn test_function_params() {
        let md = parse_expression("${nexl.funcs.sys.inc(${n}, 5)}").unwrap();
        let Action::Function(params) = md.actions.last().unwrap() else {
            panic!("expected function action");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(single_key(&params[0].actions[0]), "n");
        assert!(matches!(params[1].actions[0], Action::DefValue(_)));
    }

    #[test]
    fn test_default_value_and_cast() {
        let md = parse_expression("${port@8080:num}").unwrap();
        assert!(matches!(md.actions[1], Action::DefValue(_)));
        assert_eq!(md.actions[2], Action::Cast(CastKind::Num));
    }

    #[test]
    fn test_modifier_codes() {
        let md = parse_expression("${x~K#S^U1!}").unwrap();
        assert_eq!(md.actions[1], Action::Transformations(TransformCode::Keys));
        assert_eq!(md.actions[2], Action::ArrayOperations(ArrayOpCode::SortAsc));
        assert_eq!(
            md.actions[3],
            Action::StringOperations(StringOpCode::UpperFirst)
        );
        assert_eq!(md.actions[4], Action::EvaluateAsUndefined);
    }

    #[test]
    fn test_mandatory_value_with_and_without_message() {
        let md = parse_expression("${x*}").unwrap();
        assert_eq!(md.actions[1], Action::MandatoryValue(None));

        let md = parse_expression("${x*no x given}").unwrap();
        assert!(matches!(md.actions[1], Action::MandatoryValue(Some(_))));
    }

    #[test]
    fn test_unknown_action_char_is_reserved() {
        let md = parse_expression("${x%}").unwrap();
        assert_eq!(md.actions.len(), 2);
        assert_eq!(single_key(&md.actions[0]), "x");
        assert_eq!(md.actions[1], Action::Reserved('%'));
    }

    #[test]
    fn test_reserved_char_terminates_action_value() {
        let md = parse_expression("${port@8080|}").unwrap();
        assert_eq!(md.actions.len(), 3);
        assert!(matches!(md.actions[1], Action::DefValue(_)));
        assert_eq!(md.actions[2], Action::Reserved('|'));
    }

    #[test]
    fn test_escaped_reserved_char_stays_in_key() {
        let md = parse_expression(r"${rate\%max}").unwrap();
        assert_eq!(md.actions.len(), 1);
        assert_eq!(single_key(&md.actions[0]), "rate%max");
    }

    #[test]
    fn test_unterminated_expression_fails() {
        assert!(matches!(
            parse_template("broken ${x"),
            Err(ParseError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_invalid_cast_kind_fails() {
        assert!(parse_expression("${x:date}").is_err());
    }
}
