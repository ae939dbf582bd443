/// CUR field expression parser
///
/// Parses the expressions stored in the field-equivalence table and the
/// identifiers callers use to request proxy fields:
/// - Column references: `line_item_usage_amount`
/// - Quoted identifiers: `"identity_time_interval"`
/// - Map subscripts: `product['operating_system']`, `resource_tags['user_cost_center']`
/// - Function wrappers: `coalesce(product_region, product_region_code)`
/// - String and numeric literals
///
/// Does NOT support operators, CASE, or casts. The table never needs them.
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alphanumeric1, char, digit1, multispace0, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::errors::CurSchemaError;

/// CUR expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum CurExpr {
    /// Column reference: line_item_usage_amount
    Column(String),

    /// Quoted column: "identity_time_interval"
    QuotedColumn(String),

    /// Map subscript: product['region']
    Subscript {
        container: Box<CurExpr>,
        key: String,
    },

    /// Function call: coalesce(a, b)
    FunctionCall { name: String, args: Vec<CurExpr> },

    /// Literal: 'string', 123, 45.67
    Literal(Literal),
}

impl CurExpr {
    /// Base column names, with function wrappers, quoting and subscripts stripped
    pub fn base_columns(&self) -> Vec<String> {
        match self {
            CurExpr::Column(col) | CurExpr::QuotedColumn(col) => vec![col.clone()],
            CurExpr::Subscript { container, .. } => container.base_columns(),
            CurExpr::FunctionCall { args, .. } => {
                args.iter().flat_map(|e| e.base_columns()).collect()
            }
            CurExpr::Literal(_) => vec![],
        }
    }

    /// Source identifiers that must exist for this expression to be evaluable.
    ///
    /// Same as [`base_columns`](Self::base_columns) except that a subscript on
    /// a plain column stays a subscript (`product['region']`), so callers can
    /// tell a whole-map dependency from a single-key one.
    pub fn requirements(&self) -> Vec<String> {
        match self {
            CurExpr::Column(col) | CurExpr::QuotedColumn(col) => vec![col.clone()],
            CurExpr::Subscript { .. } => match self.as_subscript() {
                Some((container, key)) => vec![subscript_sql(container, key)],
                None => self.base_columns(),
            },
            CurExpr::FunctionCall { args, .. } => {
                args.iter().flat_map(|e| e.requirements()).collect()
            }
            CurExpr::Literal(_) => vec![],
        }
    }

    /// `(container, key)` if this is a subscript directly on a column
    pub fn as_subscript(&self) -> Option<(&str, &str)> {
        match self {
            CurExpr::Subscript { container, key } => match container.as_ref() {
                CurExpr::Column(c) | CurExpr::QuotedColumn(c) => Some((c.as_str(), key.as_str())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Column name if this is a bare or quoted column reference
    pub fn as_column(&self) -> Option<&str> {
        match self {
            CurExpr::Column(c) | CurExpr::QuotedColumn(c) => Some(c.as_str()),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            CurExpr::Column(col) => col.clone(),
            CurExpr::QuotedColumn(col) => format!("\"{}\"", col.replace('"', "\"\"")),
            CurExpr::Subscript { container, key } => {
                format!("{}[{}]", container.to_sql(), Literal::String(key.clone()).to_sql())
            }
            CurExpr::FunctionCall { name, args } => {
                let args_sql: Vec<String> = args.iter().map(|a| a.to_sql()).collect();
                format!("{}({})", name, args_sql.join(", "))
            }
            CurExpr::Literal(lit) => lit.to_sql(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Literal {
    pub fn to_sql(&self) -> String {
        match self {
            Literal::String(s) => quote_string(s),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
        }
    }
}

/// Render a SQL string literal, doubling embedded quotes
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render `container['key']`
pub fn subscript_sql(container: &str, key: &str) -> String {
    format!("{}[{}]", container, quote_string(key))
}

/// True if a column name must be double-quoted to be referenced
pub fn needs_quoting(col: &str) -> bool {
    match col.chars().next() {
        None => true,
        Some(first) if first.is_ascii_digit() => true,
        _ => col
            .chars()
            .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')),
    }
}

/// Column reference, double-quoted only when required
pub fn column_sql(col: &str) -> String {
    if needs_quoting(col) {
        CurExpr::QuotedColumn(col.to_string()).to_sql()
    } else {
        col.to_string()
    }
}

/// Parse a complete CUR expression (entry point)
pub fn parse_cur_expression(value: &str) -> Result<CurExpr, CurSchemaError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CurSchemaError::identifier_error(value, "empty expression"));
    }

    match parse_expr(trimmed) {
        Ok((remaining, ast)) => {
            let remaining = remaining.trim();
            if !remaining.is_empty() {
                return Err(CurSchemaError::identifier_error(
                    value,
                    format!("unexpected trailing content '{}'", remaining),
                ));
            }
            Ok(ast)
        }
        Err(e) => Err(CurSchemaError::identifier_error(
            value,
            format!("parse error: {:?}", e),
        )),
    }
}

/// Parse an expression followed by any number of `['key']` subscripts
pub(crate) fn parse_expr(input: &str) -> IResult<&str, CurExpr> {
    let (input, mut expr) = parse_primary_expr(input)?;

    let mut current_input = input;
    loop {
        let (new_input, _) = multispace0(current_input)?;

        match char::<_, nom::error::Error<_>>('[')(new_input) {
            Ok((new_input, _)) => {
                let (new_input, _) = multispace0(new_input)?;
                let (new_input, key) = parse_sql_string(new_input)?;
                let (new_input, _) = multispace0(new_input)?;
                let (new_input, _) = char(']')(new_input)?;

                expr = CurExpr::Subscript {
                    container: Box::new(expr),
                    key,
                };
                current_input = new_input;
            }
            Err(_) => break,
        }
    }

    Ok((current_input, expr))
}

fn parse_primary_expr(input: &str) -> IResult<&str, CurExpr> {
    alt((
        parse_function_call_expr,
        parse_literal_expr,
        parse_quoted_identifier,
        parse_identifier_expr,
    ))
    .parse(input)
}

/// Parse function call: coalesce(a, b)
fn parse_function_call_expr(input: &str) -> IResult<&str, CurExpr> {
    let (input, name) = parse_identifier_str(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;

    let (input, args) =
        separated_list0(delimited(multispace0, char(','), multispace0), parse_expr).parse(input)?;

    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;

    Ok((
        input,
        CurExpr::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

/// Parse quoted identifier: "identity_time_interval" (doubled quotes escape)
fn parse_quoted_identifier(input: &str) -> IResult<&str, CurExpr> {
    map(parse_double_quoted, CurExpr::QuotedColumn).parse(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, String> {
    parse_delimited_escaped(input, '"')
}

fn parse_identifier_expr(input: &str) -> IResult<&str, CurExpr> {
    map(parse_identifier_str, |s| CurExpr::Column(s.to_string())).parse(input)
}

fn parse_identifier_str(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alphanumeric1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Parse literal: 'string', 123, 45.67
fn parse_literal_expr(input: &str) -> IResult<&str, CurExpr> {
    alt((
        map(parse_sql_string, |s| CurExpr::Literal(Literal::String(s))),
        map_res(recognize_number, |s: &str| {
            if s.contains('.') {
                s.parse::<f64>().map(|f| CurExpr::Literal(Literal::Float(f))).map_err(|_| ())
            } else {
                s.parse::<i64>().map(|i| CurExpr::Literal(Literal::Integer(i))).map_err(|_| ())
            }
        }),
    ))
    .parse(input)
}

fn recognize_number(input: &str) -> IResult<&str, &str> {
    recognize((opt(one_of("+-")), digit1, opt(preceded(char('.'), digit1)))).parse(input)
}

/// Parse a single-quoted SQL string literal, unescaping `''`
pub(crate) fn parse_sql_string(input: &str) -> IResult<&str, String> {
    parse_delimited_escaped(input, '\'')
}

/// Parse text between `quote` characters where a doubled quote is an escaped quote
fn parse_delimited_escaped(input: &str, quote: char) -> IResult<&str, String> {
    let (mut rest, _) = char(quote)(input)?;
    let mut out = String::new();

    loop {
        match rest.find(quote) {
            Some(pos) => {
                out.push_str(&rest[..pos]);
                let after = &rest[pos + quote.len_utf8()..];
                match after.strip_prefix(quote) {
                    Some(escaped) => {
                        out.push(quote);
                        rest = escaped;
                    }
                    None => return Ok((after, out)),
                }
            }
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Char,
                )))
            }
        }
    }
}
