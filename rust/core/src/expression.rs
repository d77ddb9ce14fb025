// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arithmetic expressions for equation-type user parameters.
//!
//! A small grammar parsed with nom into an AST and evaluated
//! against an element's values. Nothing here can call out of the
//! evaluator:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | call | identifier | '[' name ']' | '(' expr ')'
//! call    := identifier '(' (expr (',' expr)*)? ')'
//! ```

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{map, map_res, opt, recognize},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    error::ErrorKind,
    IResult,
};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::value::PrimitiveValue;

/// Longest accepted expression source.
pub const MAX_EXPRESSION_LEN: usize = 1024;

/// Deepest accepted nesting of parentheses, calls, signs and exponents.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

/// Supplies variable values during evaluation.
pub trait VariableSource {
    fn variable(&self, name: &str) -> Option<PrimitiveValue>;
}

impl VariableSource for Element {
    fn variable(&self, name: &str) -> Option<PrimitiveValue> {
        self.value(name)
    }
}

impl VariableSource for BTreeMap<String, PrimitiveValue> {
    fn variable(&self, name: &str) -> Option<PrimitiveValue> {
        self.get(name).cloned()
    }
}

/// A parsed, validated expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        if source.len() > MAX_EXPRESSION_LEN {
            return Err(Error::ExpressionParse {
                offset: MAX_EXPRESSION_LEN,
                message: "expression too long".into(),
            });
        }

        let root = match delimited(ws, |i| expr(i, 0), ws)(source) {
            Ok(("", root)) => root,
            Ok((rest, _)) => {
                return Err(Error::ExpressionParse {
                    offset: source.len() - rest.len(),
                    message: format!("unexpected input '{}'", rest.chars().take(16).collect::<String>()),
                })
            }
            Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => {
                return Err(Error::ExpressionParse {
                    offset: source.len() - e.input.len(),
                    message: format!("nesting deeper than {} levels", MAX_EXPRESSION_DEPTH),
                })
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(Error::ExpressionParse {
                    offset: source.len() - e.input.len(),
                    message: format!("{:?}", e.code),
                })
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(Error::ExpressionParse {
                    offset: source.len(),
                    message: "incomplete expression".into(),
                })
            }
        };

        validate_calls(&root)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Variable names referenced, in first-use order without repeats.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_variables(&self.root, &mut out);
        out
    }

    pub fn evaluate<V: VariableSource + ?Sized>(&self, vars: &V) -> Result<f64> {
        eval(&self.root, vars)
    }
}

fn collect_variables(e: &Expr, out: &mut Vec<String>) {
    match e {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Neg(inner) => collect_variables(inner, out),
        Expr::Binary(_, l, r) => {
            collect_variables(l, out);
            collect_variables(r, out);
        }
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_variables(a, out)),
    }
}

fn validate_calls(e: &Expr) -> Result<()> {
    match e {
        Expr::Number(_) | Expr::Variable(_) => Ok(()),
        Expr::Neg(inner) => validate_calls(inner),
        Expr::Binary(_, l, r) => {
            validate_calls(l)?;
            validate_calls(r)
        }
        Expr::Call { name, args } => {
            let (ok, expected) = match name.as_str() {
                "abs" | "floor" | "ceil" | "sqrt" => (args.len() == 1, "1"),
                "round" => ((1..=2).contains(&args.len()), "1 or 2"),
                "min" | "max" => (!args.is_empty(), "at least 1"),
                _ => return Err(Error::UnknownFunction(name.clone())),
            };
            if !ok {
                return Err(Error::Arity {
                    name: name.clone(),
                    expected,
                    got: args.len(),
                });
            }
            args.iter().try_for_each(validate_calls)
        }
    }
}

fn eval<V: VariableSource + ?Sized>(e: &Expr, vars: &V) -> Result<f64> {
    match e {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(name) => match vars.variable(name) {
            Some(PrimitiveValue::Number(n)) => Ok(n),
            Some(PrimitiveValue::Boolean(b)) => Ok(if b { 1.0 } else { 0.0 }),
            Some(PrimitiveValue::String(_)) => Err(Error::NonNumericVariable(name.clone())),
            None => Err(Error::UnknownVariable(name.clone())),
        },
        Expr::Neg(inner) => Ok(-eval(inner, vars)?),
        Expr::Binary(op, l, r) => {
            let a = eval(l, vars)?;
            let b = eval(r, vars)?;
            match op {
                BinaryOp::Add => Ok(a + b),
                BinaryOp::Sub => Ok(a - b),
                BinaryOp::Mul => Ok(a * b),
                BinaryOp::Div if b == 0.0 => Err(Error::DivisionByZero),
                BinaryOp::Div => Ok(a / b),
                BinaryOp::Rem if b == 0.0 => Err(Error::DivisionByZero),
                BinaryOp::Rem => Ok(a % b),
                BinaryOp::Pow => Ok(a.powf(b)),
            }
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, vars))
                .collect::<Result<Vec<f64>>>()?;
            match name.as_str() {
                "abs" => Ok(values[0].abs()),
                "floor" => Ok(values[0].floor()),
                "ceil" => Ok(values[0].ceil()),
                "sqrt" => Ok(values[0].sqrt()),
                "round" => {
                    let digits = values.get(1).copied().unwrap_or(0.0).trunc();
                    let factor = 10f64.powf(digits);
                    Ok((values[0] * factor).round() / factor)
                }
                "min" => Ok(values.into_iter().fold(f64::INFINITY, f64::min)),
                "max" => Ok(values.into_iter().fold(f64::NEG_INFINITY, f64::max)),
                other => Err(Error::UnknownFunction(other.to_string())),
            }
        }
    }
}

// =============================================================================
// Grammar
// =============================================================================

fn ws(input: &str) -> IResult<&str, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

/// 12, 1.5, .5, 2e3, 1.5E-2
fn number(input: &str) -> IResult<&str, Expr> {
    map_res(
        recognize(tuple((
            alt((
                recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Expr::Number),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

/// [Any Parameter Name]
fn bracketed(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('['), take_while1(|c: char| c != ']'), char(']')),
        |name: &str| Expr::Variable(name.trim().to_string()),
    )(input)
}

fn call(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, _) = preceded(ws, char('('))(input)?;
    let (input, depth) = descend(input, depth)?;
    let (input, args) = terminated(
        separated_list0(char(','), delimited(ws, |i| expr(i, depth), ws)),
        preceded(ws, char(')')),
    )(input)?;
    Ok((
        input,
        Expr::Call {
            name: name.to_lowercase(),
            args,
        },
    ))
}

fn parens(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, _) = char('(')(input)?;
    let (input, depth) = descend(input, depth)?;
    terminated(delimited(ws, move |i| expr(i, depth), ws), char(')'))(input)
}

fn primary(input: &str, depth: usize) -> IResult<&str, Expr> {
    alt((
        number,
        |i| call(i, depth),
        map(identifier, |name| Expr::Variable(name.to_string())),
        bracketed,
        |i| parens(i, depth),
    ))(input)
}

fn power(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, base) = primary(input, depth)?;
    let exponent = |i| descend(i, depth).and_then(|(i, depth)| unary(i, depth));
    let (input, exponent) = opt(preceded(delimited(ws, char('^'), ws), exponent))(input)?;
    Ok((
        input,
        match exponent {
            Some(e) => Expr::binary(BinaryOp::Pow, base, e),
            None => base,
        },
    ))
}

fn unary(input: &str, depth: usize) -> IResult<&str, Expr> {
    if let Ok((rest, sign)) = terminated(one_of("-+"), ws)(input) {
        let (rest, depth) = descend(rest, depth)?;
        let (rest, operand) = unary(rest, depth)?;
        let e = if sign == '-' { Expr::Neg(Box::new(operand)) } else { operand };
        return Ok((rest, e));
    }
    power(input, depth)
}

fn term(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = unary(input, depth)?;
    fold_many0(
        pair(delimited(ws, one_of("*/%"), ws), |i| unary(i, depth)),
        move || first.clone(),
        |acc, (op, rhs)| {
            let op = match op {
                '*' => BinaryOp::Mul,
                '/' => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            Expr::binary(op, acc, rhs)
        },
    )(input)
}

fn expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = term(input, depth)?;
    fold_many0(
        pair(delimited(ws, one_of("+-"), ws), |i| term(i, depth)),
        move || first.clone(),
        |acc, (op, rhs)| {
            let op = if op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            Expr::binary(op, acc, rhs)
        },
    )(input)
}

/// One level deeper, or a hard failure past `MAX_EXPRESSION_DEPTH`.
fn descend(input: &str, depth: usize) -> IResult<&str, usize> {
    if depth >= MAX_EXPRESSION_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    Ok((input, depth + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, PrimitiveValue)]) -> BTreeMap<String, PrimitiveValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval_str(src: &str) -> f64 {
        Expression::parse(src).unwrap().evaluate(&vars(&[])).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_str("1 + 2 * 3"), 7.0);
        assert_eq!(eval_str("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_str("10 - 4 - 3"), 3.0);
        assert_eq!(eval_str("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval_str("-2 ^ 2"), -4.0);
        assert_eq!(eval_str("7 % 4"), 3.0);
        assert_eq!(eval_str(".5 + 1.5e1"), 15.5);
    }

    #[test]
    fn variables_plain_and_bracketed() {
        let e = Expression::parse("Width * [Unconnected Height] / 1000").unwrap();
        let v = vars(&[
            ("Width", PrimitiveValue::Number(200.0)),
            ("Unconnected Height", PrimitiveValue::Number(3000.0)),
        ]);
        assert_eq!(e.evaluate(&v).unwrap(), 600.0);
        assert_eq!(e.variables(), vec!["Width", "Unconnected Height"]);
    }

    #[test]
    fn booleans_count_as_bits_strings_do_not_coerce() {
        let e = Expression::parse("flag * 10").unwrap();
        assert_eq!(
            e.evaluate(&vars(&[("flag", PrimitiveValue::Boolean(true))])).unwrap(),
            10.0
        );
        assert_eq!(
            e.evaluate(&vars(&[("flag", PrimitiveValue::String("1".into()))])),
            Err(Error::NonNumericVariable("flag".into()))
        );
        assert_eq!(
            e.evaluate(&vars(&[])),
            Err(Error::UnknownVariable("flag".into()))
        );
    }

    #[test]
    fn functions() {
        assert_eq!(eval_str("max(1, 5, 3)"), 5.0);
        assert_eq!(eval_str("MIN(4, -2)"), -2.0);
        assert_eq!(eval_str("round(2.346, 2)"), 2.35);
        assert_eq!(eval_str("abs(-3) + floor(1.7) + ceil(1.2)"), 6.0);
        assert_eq!(eval_str("sqrt(16)"), 4.0);
    }

    #[test]
    fn unknown_function_and_arity_fail_at_parse() {
        assert_eq!(
            Expression::parse("exec(1)"),
            Err(Error::UnknownFunction("exec".into()))
        );
        assert!(matches!(
            Expression::parse("abs(1, 2)"),
            Err(Error::Arity { got: 2, .. })
        ));
    }

    #[test]
    fn division_by_zero() {
        let e = Expression::parse("1 / (2 - 2)").unwrap();
        assert_eq!(e.evaluate(&vars(&[])), Err(Error::DivisionByZero));
    }

    #[test]
    fn syntax_errors_report_offset() {
        match Expression::parse("1 + * 2") {
            Err(Error::ExpressionParse { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(Expression::parse("(1 + 2").is_err());
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse(&"1+".repeat(600)).is_err());
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        match Expression::parse(&deep) {
            Err(Error::ExpressionParse { offset, message }) => {
                assert!(offset > MAX_EXPRESSION_DEPTH && offset < deep.len());
                assert!(message.contains("nesting"));
            }
            other => panic!("expected depth error, got {:?}", other),
        }

        let negations = format!("{}1", "-".repeat(1000));
        assert!(matches!(
            Expression::parse(&negations),
            Err(Error::ExpressionParse { .. })
        ));

        let calls = format!("{}1{}", "abs(".repeat(200), ")".repeat(200));
        assert!(Expression::parse(&calls).is_err());

        let exponents = format!("2{}", "^2".repeat(400));
        assert!(Expression::parse(&exponents).is_err());
    }

    #[test]
    fn moderate_nesting_still_parses() {
        assert_eq!(eval_str(&format!("{}7{}", "(".repeat(10), ")".repeat(10))), 7.0);
        assert_eq!(eval_str("--3"), 3.0);
        assert_eq!(eval_str("abs(min(-(2), max(1, (3))))"), 2.0);
    }

    #[test]
    fn evaluates_against_elements() {
        let e = Element::new("1", "Walls", "W1").with_parameter("Area", 12.5);
        let expr = Expression::parse("Area * 2").unwrap();
        assert_eq!(expr.evaluate(&e).unwrap(), 25.0);
    }
}
