//! Text format parser.
//!
//! One statement or data declaration per line, `;` starts a comment:
//!
//! ```text
//! waveform gauss 0.0 0.5 1.0 0.5 0.0
//! acquisition readout 4
//! @0    set_offset 0.5 0.5
//! @0    var n int
//! @0    n = (n + 1) & 0xFF
//! @100  play gauss gauss
//! @200  acquire readout 0
//! ```
//!
//! Operands may also be separated by commas. Expressions support
//! `| ^ & << >> + -` (lowest to highest precedence), unary `-` and `~`,
//! parentheses, integer and float literals and variable names.

use thiserror::Error;

use crate::core::{CompileError, DType};
use crate::q1::{BinOp, Comparison, DataTables, Expr, Operator, UnOp};

use super::{Arg, LoopKind, RampTarget, Statement, StatementKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    /// The offending source line.
    pub text: String,
    pub message: String,
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::syntax(err.message).with_statement(err.text, Some(err.line))
    }
}

/// Statements and data tables of a text program.
#[derive(Debug, Clone, Default)]
pub struct ParsedSequence {
    pub statements: Vec<Statement>,
    pub tables: DataTables,
}

type ParseResult<T> = Result<T, String>;

pub fn parse(text: &str) -> Result<ParsedSequence, ParseError> {
    let mut parsed = ParsedSequence::default();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let code = raw.split(';').next().unwrap_or_default().trim();
        if code.is_empty() {
            continue;
        }
        let fail = |message: String| ParseError {
            line,
            text: code.to_string(),
            message,
        };
        if let Some(rest) = code.strip_prefix('@') {
            let statement = parse_statement(rest).map_err(fail)?;
            parsed.statements.push(statement.at_line(line));
        } else {
            parse_data(code, &mut parsed.tables).map_err(fail)?;
        }
    }
    Ok(parsed)
}

fn parse_data(code: &str, tables: &mut DataTables) -> ParseResult<()> {
    let words = split_operands(code);
    let (kind, name, values) = match words.as_slice() {
        [kind, name, values @ ..] => (*kind, *name, values),
        _ => return Err(format!("expected `@<time>` or a data declaration, got `{code}`")),
    };
    check_identifier(name)?;
    match kind {
        "waveform" | "weight" => {
            let samples = values
                .iter()
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|_| format!("invalid sample `{v}`"))
                })
                .collect::<ParseResult<Vec<f64>>>()?;
            let added = if kind == "waveform" {
                tables.add_waveform(name, samples)
            } else {
                tables.add_weight(name, samples)
            };
            added.map_err(|e| e.to_string())?;
        }
        "acquisition" => {
            let [bins] = values else {
                return Err("acquisition takes a name and a bin count".to_string());
            };
            let bins = bins
                .parse::<u32>()
                .map_err(|_| format!("invalid bin count `{bins}`"))?;
            tables.add_acquisition(name, bins).map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unknown declaration `{other}`")),
    }
    Ok(())
}

fn split_operands(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect()
}

fn parse_statement(rest: &str) -> ParseResult<Statement> {
    let split = rest
        .find(char::is_whitespace)
        .ok_or_else(|| "statement needs an operation after the time".to_string())?;
    let (time, body) = rest.split_at(split);
    let time = time
        .parse::<u64>()
        .map_err(|_| format!("invalid time `@{time}`"))?;
    let body = body.trim();

    if let Some((lhs, rhs)) = body.split_once('=') {
        let name = lhs.trim();
        check_identifier(name)?;
        let expr = parse_expr(rhs)?;
        return Ok(Statement::new(
            time,
            StatementKind::Assign {
                name: name.to_string(),
                expr,
            },
        ));
    }

    let words = split_operands(body);
    let (op, args) = words
        .split_first()
        .ok_or_else(|| "missing operation".to_string())?;
    let kind = parse_operation(op, args)?;
    Ok(Statement::new(time, kind))
}

fn expect_args<'a, const N: usize>(op: &str, args: &[&'a str]) -> ParseResult<[&'a str; N]> {
    <[&str; N]>::try_from(args)
        .map_err(|_| format!("`{op}` takes {N} operand(s), got {}", args.len()))
}

fn parse_operation(op: &str, args: &[&str]) -> ParseResult<StatementKind> {
    use StatementKind::*;

    let kind = match op {
        "var" => {
            let [name, dtype] = expect_args::<2>(op, args)?;
            check_identifier(name)?;
            let dtype = match dtype {
                "int" => DType::Int,
                "float" => DType::Float,
                other => return Err(format!("unknown type `{other}`")),
            };
            Declare {
                name: name.to_string(),
                dtype,
            }
        }
        "label" => {
            let [name] = expect_args::<1>(op, args)?;
            Label(name.to_string())
        }
        "jmp" => {
            let [label] = expect_args::<1>(op, args)?;
            Jump(label.to_string())
        }
        "jlt" | "jge" => {
            let [var, threshold, label] = expect_args::<3>(op, args)?;
            check_identifier(var)?;
            JumpIf {
                var: var.to_string(),
                cmp: if op == "jlt" {
                    Comparison::Lt
                } else {
                    Comparison::Ge
                },
                threshold: parse_int(threshold)?,
                label: label.to_string(),
            }
        }
        "repeat" => {
            let [count] = expect_args::<1>(op, args)?;
            let count = parse_int(count)?;
            if count < 0 {
                return Err(format!("negative repeat count {count}"));
            }
            LoopStart(LoopKind::Repeat {
                count: count as u64,
            })
        }
        "for" => {
            let (var, start, stop, step) = match args {
                [var, start, stop] => (var, start, stop, "1"),
                [var, start, stop, step] => (var, start, stop, *step),
                _ => return Err("`for` takes a variable, start, stop and optional step".to_string()),
            };
            check_identifier(var)?;
            LoopStart(LoopKind::Range {
                var: var.to_string(),
                start: parse_int(start)?,
                stop: parse_int(stop)?,
                step: parse_int(step)?,
            })
        }
        "end_repeat" | "end_for" | "end_loop" => {
            expect_args::<0>(op, args)?;
            LoopEnd
        }
        "wait" => {
            let [duration] = expect_args::<1>(op, args)?;
            Wait(parse_arg(duration)?)
        }
        "set_markers" => {
            let [markers] = expect_args::<1>(op, args)?;
            SetMarkers(parse_arg(markers)?)
        }
        "reset_phase" => {
            expect_args::<0>(op, args)?;
            ResetPhase
        }
        "set_phase" => {
            let [phase] = expect_args::<1>(op, args)?;
            SetPhase(parse_arg(phase)?)
        }
        "shift_phase" => {
            let [delta] = expect_args::<1>(op, args)?;
            ShiftPhase(parse_arg(delta)?)
        }
        "set_frequency" => {
            let [frequency] = expect_args::<1>(op, args)?;
            SetFrequency(parse_arg(frequency)?)
        }
        "set_offset" | "set_gain" => {
            let [a, b] = expect_args::<2>(op, args)?;
            let (a, b) = (parse_arg(a)?, parse_arg(b)?);
            if op == "set_offset" {
                SetOffset(a, b)
            } else {
                SetGain(a, b)
            }
        }
        "ramp_offset" | "ramp_gain" => {
            let [from0, from1, to0, to1, duration] = expect_args::<5>(op, args)?;
            let duration = parse_int(duration)?;
            if duration < 0 {
                return Err(format!("negative ramp duration {duration}"));
            }
            Ramp {
                target: if op == "ramp_offset" {
                    RampTarget::Offset
                } else {
                    RampTarget::Gain
                },
                from: (parse_float(from0)?, parse_float(from1)?),
                to: (parse_float(to0)?, parse_float(to1)?),
                duration: duration as u64,
            }
        }
        "play" => {
            let (wave0, wave1) = match args {
                [wave] => (*wave, *wave),
                [wave0, wave1] => (*wave0, *wave1),
                _ => return Err("`play` takes one or two waveform names".to_string()),
            };
            Play {
                wave0: wave0.to_string(),
                wave1: wave1.to_string(),
            }
        }
        "acquire" => {
            let [acquisition, bin] = expect_args::<2>(op, args)?;
            Acquire {
                acquisition: acquisition.to_string(),
                bin: parse_arg(bin)?,
            }
        }
        "acquire_weighed" => {
            let [acquisition, bin, weight0, weight1] = expect_args::<4>(op, args)?;
            AcquireWeighed {
                acquisition: acquisition.to_string(),
                bin: parse_arg(bin)?,
                weight0: weight0.to_string(),
                weight1: weight1.to_string(),
            }
        }
        "acquire_ttl" => {
            let [acquisition, bin, enable] = expect_args::<3>(op, args)?;
            AcquireTtl {
                acquisition: acquisition.to_string(),
                bin: parse_arg(bin)?,
                enable: parse_flag(enable)?,
            }
        }
        "set_latch_en" => {
            let [enable] = expect_args::<1>(op, args)?;
            SetLatchEnable(parse_flag(enable)?)
        }
        "latch_rst" => {
            expect_args::<0>(op, args)?;
            ResetLatch
        }
        "if_start" => {
            let counters = args
                .iter()
                .map(|c| {
                    c.parse::<u8>()
                        .map_err(|_| format!("invalid trigger counter `{c}`"))
                })
                .collect::<ParseResult<Vec<u8>>>()?;
            ConditionalStart { counters }
        }
        "branch" => {
            let [operator] = expect_args::<1>(op, args)?;
            Branch(
                operator
                    .parse::<Operator>()
                    .map_err(|_| format!("unknown operator `{operator}`"))?,
            )
        }
        "end_branch" => {
            expect_args::<0>(op, args)?;
            BranchEnd
        }
        "if_end" => {
            expect_args::<0>(op, args)?;
            ConditionalEnd
        }
        other => return Err(format!("unknown operation `{other}`")),
    };
    Ok(kind)
}

fn check_identifier(name: &str) -> ParseResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(format!("invalid name `{name}`"));
    }
    Ok(())
}

fn parse_int(text: &str) -> ParseResult<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| format!("invalid integer `{text}`"))?;
    Ok(if negative { -value } else { value })
}

fn parse_float(text: &str) -> ParseResult<f64> {
    text.parse::<f64>()
        .map_err(|_| format!("invalid number `{text}`"))
}

fn parse_flag(text: &str) -> ParseResult<bool> {
    match text {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(format!("expected 0 or 1, got `{other}`")),
    }
}

fn is_float_literal(text: &str) -> bool {
    !text.starts_with("0x") && text.contains(['.', 'e', 'E'])
}

fn parse_arg(text: &str) -> ParseResult<Arg> {
    let first = text.chars().next().unwrap_or_default();
    if first.is_ascii_digit() || first == '-' || first == '.' {
        if is_float_literal(text) {
            return parse_float(text).map(Arg::Float);
        }
        return parse_int(text).map(Arg::Int);
    }
    check_identifier(text)?;
    Ok(Arg::Var(text.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: [&str; 9] = ["<<", ">>", "+", "-", "&", "|", "^", "~", "*"];

fn tokenize(text: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
        } else if ch == '(' {
            tokens.push(Token::LParen);
            pos += 1;
        } else if ch == ')' {
            tokens.push(Token::RParen);
            pos += 1;
        } else if ch.is_ascii_digit() || ch == '.' {
            let start = pos;
            while pos < chars.len() {
                let c = chars[pos];
                let exponent_sign = (c == '+' || c == '-')
                    && matches!(chars[pos - 1], 'e' | 'E')
                    && !chars[start..pos].iter().any(|c| matches!(c, 'x' | 'X'));
                if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                    pos += 1;
                } else {
                    break;
                }
            }
            let literal: String = chars[start..pos].iter().collect();
            tokens.push(if is_float_literal(&literal) {
                Token::Float(parse_float(&literal)?)
            } else {
                Token::Int(parse_int(&literal)?)
            });
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
        } else {
            let rest: String = chars[pos..].iter().collect();
            let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                return Err(format!("unexpected character `{ch}` in expression"));
            };
            if *op == "*" {
                return Err("multiplication is not supported by the sequencer ALU".to_string());
            }
            tokens.push(Token::Op(*op));
            pos += op.len();
        }
    }
    Ok(tokens)
}

/// Binary operator levels, lowest precedence first.
const LEVELS: [&[(&str, BinOp)]; 5] = [
    &[("|", BinOp::Or)],
    &[("^", BinOp::Xor)],
    &[("&", BinOp::And)],
    &[("<<", BinOp::Shl), (">>", BinOp::Shr)],
    &[("+", BinOp::Add), ("-", BinOp::Sub)],
];

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        let Some(ops) = LEVELS.get(level) else {
            return self.unary();
        };
        let mut lhs = self.binary(level + 1)?;
        while let Some(Token::Op(symbol)) = self.peek() {
            let Some(&(_, op)) = ops.iter().find(|(s, _)| s == symbol) else {
                break;
            };
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Token::Op("-")) => {
                self.pos += 1;
                Ok(match self.unary()? {
                    Expr::Int(v) => Expr::Int(-v),
                    Expr::Float(v) => Expr::Float(-v),
                    inner => Expr::unary(UnOp::Neg, inner),
                })
            }
            Some(Token::Op("~")) => {
                self.pos += 1;
                Ok(Expr::unary(UnOp::Not, self.unary()?))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Expr::Int(v)),
            Some(Token::Float(v)) => Ok(Expr::Float(v)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.binary(0)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing `)`".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected {token:?} in expression")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn parse_expr(text: &str) -> ParseResult<Expr> {
    let mut parser = ExprParser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    let expr = parser.binary(0)?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected {token:?} after expression"));
    }
    Ok(expr)
}
