//! Payload template language.
//!
//! A small Jinja-like language used for topics and payloads. Templates are
//! compiled once when the configuration is loaded and rendered against a
//! JSON object.
//!
//! ## Syntax
//!
//! | Form                                  | Meaning                             |
//! |---------------------------------------|-------------------------------------|
//! | `{{ json.level }}`                    | Interpolate a dotted path           |
//! | `{{ on_str \| upper }}`               | Apply a filter                      |
//! | `{{ on_str.lower() }}`                | Method form of `lower` / `upper`    |
//! | `{{ 'text' }}`, `{{ 12 }}`            | Literals                            |
//! | `{% if x is defined %}…{% endif %}`   | Conditional (`is not defined` too)  |
//! | `{% if not x %}…{% elif y %}…{% else %}…{% endif %}` | Truthiness tests     |
//!
//! Filters: `lower`, `upper`, `int`, `float`, `round(n)`. Interpolating an
//! undefined path is a render error; conditions treat undefined as false.

use serde_json::{Number, Value};
use thiserror::Error;

/// Template compile or render failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text is malformed.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset of the offending tag.
        offset: usize,
        /// What is wrong.
        message: String,
    },

    /// An interpolated path does not exist in the data.
    #[error("undefined variable '{0}'")]
    Undefined(String),

    /// A filter was given an argument it cannot use.
    #[error("filter '{filter}': {message}")]
    Filter {
        /// Filter name.
        filter: String,
        /// What is wrong.
        message: String,
    },
}

impl TemplateError {
    fn syntax(offset: usize, message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

// ============================================================================
// Compiled Form
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Expr(Expr),
    If {
        cond: Cond,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(Vec<String>),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Filter {
    Lower,
    Upper,
    Int,
    Float,
    Round(i32),
}

#[derive(Debug, Clone, PartialEq)]
struct Expr {
    operand: Operand,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Defined { expr: Expr, negate: bool },
    Truthy { expr: Expr, negate: bool },
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Template {
    /// Compile template text.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let segments = split_segments(source)?;
        let mut parser = BlockParser {
            segments: &segments,
            pos: 0,
        };
        let (nodes, terminator) = parser.parse_block()?;
        if let Some((stmt, offset)) = terminator {
            return Err(TemplateError::syntax(
                offset,
                format!("unexpected '{{% {} %}}'", stmt.keyword()),
            ));
        }
        Ok(Template {
            source: source.to_string(),
            nodes,
        })
    }

    /// Template source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if the template renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Render against a JSON object.
    pub fn render(&self, data: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        render_nodes(&self.nodes, data, &mut out)?;
        Ok(out)
    }
}

// ============================================================================
// Segmenting
// ============================================================================

#[derive(Debug)]
enum Segment<'a> {
    Text(&'a str),
    Expr(&'a str, usize),
    Stmt(&'a str, usize),
}

fn split_segments(source: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let next_expr = rest.find("{{");
        let next_stmt = rest.find("{%");
        let (open, is_expr) = match (next_expr, next_stmt) {
            (None, None) => {
                segments.push(Segment::Text(rest));
                break;
            }
            (Some(e), Some(s)) if s < e => (s, false),
            (Some(e), _) => (e, true),
            (None, Some(s)) => (s, false),
        };

        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let close_tag = if is_expr { "}}" } else { "%}" };
        let body_start = open + 2;
        let Some(close) = rest[body_start..].find(close_tag) else {
            return Err(TemplateError::syntax(
                pos + open,
                format!("missing closing '{close_tag}'"),
            ));
        };
        let body = rest[body_start..body_start + close].trim();
        let offset = pos + open;
        segments.push(if is_expr {
            Segment::Expr(body, offset)
        } else {
            Segment::Stmt(body, offset)
        });
        pos += body_start + close + 2;
    }

    Ok(segments)
}

// ============================================================================
// Block Parsing
// ============================================================================

#[derive(Debug)]
enum Stmt {
    If(Cond),
    Elif(Cond),
    Else,
    Endif,
}

impl Stmt {
    fn keyword(&self) -> &'static str {
        match self {
            Stmt::If(_) => "if",
            Stmt::Elif(_) => "elif",
            Stmt::Else => "else",
            Stmt::Endif => "endif",
        }
    }

    fn parse(body: &str, offset: usize) -> Result<Self, TemplateError> {
        let (keyword, rest) = match body.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (body, ""),
        };
        match keyword {
            "if" => Ok(Stmt::If(parse_cond(rest, offset)?)),
            "elif" => Ok(Stmt::Elif(parse_cond(rest, offset)?)),
            "else" if rest.is_empty() => Ok(Stmt::Else),
            "endif" if rest.is_empty() => Ok(Stmt::Endif),
            _ => Err(TemplateError::syntax(
                offset,
                format!("unsupported statement '{body}'"),
            )),
        }
    }
}

struct BlockParser<'s, 'a> {
    segments: &'s [Segment<'a>],
    pos: usize,
}

impl BlockParser<'_, '_> {
    /// Parse nodes until a block-ending statement or the end of input.
    fn parse_block(&mut self) -> Result<(Vec<Node>, Option<(Stmt, usize)>), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.get(self.pos) {
            self.pos += 1;
            match segment {
                Segment::Text(text) => nodes.push(Node::Text((*text).to_string())),
                Segment::Expr(body, offset) => nodes.push(Node::Expr(parse_expr_str(body, *offset)?)),
                Segment::Stmt(body, offset) => match Stmt::parse(body, *offset)? {
                    Stmt::If(cond) => nodes.push(self.parse_if(cond, *offset)?),
                    other => return Ok((nodes, Some((other, *offset)))),
                },
            }
        }
        Ok((nodes, None))
    }

    fn parse_if(&mut self, cond: Cond, offset: usize) -> Result<Node, TemplateError> {
        let (then, terminator) = self.parse_block()?;
        let otherwise = match terminator {
            Some((Stmt::Endif, _)) => Vec::new(),
            Some((Stmt::Else, else_offset)) => {
                let (otherwise, end) = self.parse_block()?;
                match end {
                    Some((Stmt::Endif, _)) => otherwise,
                    _ => return Err(TemplateError::syntax(else_offset, "'else' without 'endif'")),
                }
            }
            Some((Stmt::Elif(next), elif_offset)) => vec![self.parse_if(next, elif_offset)?],
            Some((Stmt::If(_), _)) | None => {
                return Err(TemplateError::syntax(offset, "'if' without 'endif'"));
            }
        };
        Ok(Node::If {
            cond,
            then,
            otherwise,
        })
    }
}

// ============================================================================
// Expression Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Dot,
    Pipe,
    LParen,
    RParen,
    Comma,
}

fn lex(src: &str, offset: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(TemplateError::syntax(offset + i, "unterminated string"));
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' || (ch == '-' && text.is_empty()) {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Literal(parse_number(&text).ok_or_else(|| {
                    TemplateError::syntax(offset + i, format!("bad number '{text}'"))
                })?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text));
            }
            other => {
                return Err(TemplateError::syntax(
                    offset + i,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }
    Ok(tokens)
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::from(int));
    }
    let float = text.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    offset: usize,
}

impl ExprParser {
    fn new(src: &str, offset: usize) -> Result<Self, TemplateError> {
        Ok(ExprParser {
            tokens: lex(src, offset)?,
            pos: 0,
            offset,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(self.offset, message)
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), TemplateError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(self.error(format!("expected {token:?}, found {other:?}"))),
        }
    }

    fn finish(&self) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, TemplateError> {
        let operand = match self.next() {
            Some(Token::Literal(value)) => Operand::Literal(value),
            Some(Token::Ident(name)) => {
                let mut path = vec![name];
                // `a.b` extends the path; `a.lower()` is a method call.
                while self.peek() == Some(&Token::Dot)
                    && matches!(self.peek_at(1), Some(Token::Ident(_)))
                    && self.peek_at(2) != Some(&Token::LParen)
                {
                    self.pos += 1;
                    if let Some(Token::Ident(segment)) = self.next() {
                        path.push(segment);
                    }
                }
                Operand::Path(path)
            }
            other => return Err(self.error(format!("expected a value, found {other:?}"))),
        };

        let mut filters = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.ident()?;
                    self.expect(Token::LParen)?;
                    let args = self.args()?;
                    if !matches!(name.as_str(), "lower" | "upper") {
                        return Err(self.error(format!("unknown method '{name}'")));
                    }
                    filters.push(self.filter(&name, &args)?);
                }
                Some(Token::Pipe) => {
                    self.pos += 1;
                    let name = self.ident()?;
                    let args = if self.peek() == Some(&Token::LParen) {
                        self.pos += 1;
                        self.args()?
                    } else {
                        Vec::new()
                    };
                    filters.push(self.filter(&name, &args)?);
                }
                _ => break,
            }
        }
        Ok(Expr { operand, filters })
    }

    fn ident(&mut self) -> Result<String, TemplateError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(self.error(format!("expected a name, found {other:?}"))),
        }
    }

    /// Arguments up to and including the closing parenthesis.
    fn args(&mut self) -> Result<Vec<Value>, TemplateError> {
        let mut args = Vec::new();
        loop {
            match self.next() {
                Some(Token::RParen) => return Ok(args),
                Some(Token::Literal(value)) => {
                    args.push(value);
                    match self.next() {
                        Some(Token::Comma) => {}
                        Some(Token::RParen) => return Ok(args),
                        other => return Err(self.error(format!("expected ',' or ')', found {other:?}"))),
                    }
                }
                other => return Err(self.error(format!("bad argument {other:?}"))),
            }
        }
    }

    fn filter(&self, name: &str, args: &[Value]) -> Result<Filter, TemplateError> {
        let no_args = |filter: Filter| {
            if args.is_empty() {
                Ok(filter)
            } else {
                Err(self.error(format!("'{name}' takes no arguments")))
            }
        };
        match name {
            "lower" => no_args(Filter::Lower),
            "upper" => no_args(Filter::Upper),
            "int" => no_args(Filter::Int),
            "float" => no_args(Filter::Float),
            "round" => match args {
                [] => Ok(Filter::Round(0)),
                [digits] => digits
                    .as_i64()
                    .map(|d| Filter::Round(d as i32))
                    .ok_or_else(|| self.error("'round' takes an integer")),
                _ => Err(self.error("'round' takes one argument")),
            },
            other => Err(self.error(format!("unknown filter '{other}'"))),
        }
    }

    fn parse_cond(&mut self) -> Result<Cond, TemplateError> {
        let negate = self.eat_ident("not");
        let expr = self.parse_expr()?;
        if self.eat_ident("is") {
            let is_not = self.eat_ident("not");
            if !self.eat_ident("defined") {
                return Err(self.error("only 'is defined' tests are supported"));
            }
            return Ok(Cond::Defined {
                expr,
                negate: negate != is_not,
            });
        }
        Ok(Cond::Truthy { expr, negate })
    }
}

fn parse_expr_str(src: &str, offset: usize) -> Result<Expr, TemplateError> {
    let mut parser = ExprParser::new(src, offset)?;
    let expr = parser.parse_expr()?;
    parser.finish()?;
    Ok(expr)
}

fn parse_cond(src: &str, offset: usize) -> Result<Cond, TemplateError> {
    let mut parser = ExprParser::new(src, offset)?;
    let cond = parser.parse_cond()?;
    parser.finish()?;
    Ok(cond)
}

// ============================================================================
// Rendering
// ============================================================================

fn render_nodes(nodes: &[Node], data: &Value, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr(expr) => match expr.eval(data)? {
                Some(value) => out.push_str(&display(&value)),
                None => return Err(TemplateError::Undefined(expr.describe())),
            },
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if cond.eval(data)? { then } else { otherwise };
                render_nodes(branch, data, out)?;
            }
        }
    }
    Ok(())
}

impl Expr {
    /// Evaluate; `None` means undefined.
    fn eval(&self, data: &Value) -> Result<Option<Value>, TemplateError> {
        let mut value = match &self.operand {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => match lookup(data, path) {
                Some(value) => value.clone(),
                None => return Ok(None),
            },
        };
        for filter in &self.filters {
            value = filter.apply(value)?;
        }
        Ok(Some(value))
    }

    fn describe(&self) -> String {
        match &self.operand {
            Operand::Path(path) => path.join("."),
            Operand::Literal(value) => display(value),
        }
    }
}

impl Cond {
    fn eval(&self, data: &Value) -> Result<bool, TemplateError> {
        Ok(match self {
            Cond::Defined { expr, negate } => expr.eval(data)?.is_some() != *negate,
            Cond::Truthy { expr, negate } => {
                expr.eval(data)?.as_ref().map_or(false, truthy) != *negate
            }
        })
    }
}

impl Filter {
    fn apply(self, value: Value) -> Result<Value, TemplateError> {
        Ok(match self {
            Filter::Lower => Value::String(display(&value).to_lowercase()),
            Filter::Upper => Value::String(display(&value).to_uppercase()),
            Filter::Int => Value::from(to_f64(&value).map_or(0, |f| f.trunc() as i64)),
            Filter::Float => float_value(to_f64(&value).unwrap_or(0.0))?,
            Filter::Round(digits) => {
                let scale = 10f64.powi(digits);
                float_value((to_f64(&value).unwrap_or(0.0) * scale).round() / scale)?
            }
        })
    }
}

fn float_value(f: f64) -> Result<Value, TemplateError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| TemplateError::Filter {
            filter: "float".to_string(),
            message: format!("{f} is not a finite number"),
        })
}

fn lookup<'v>(data: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter()
        .try_fold(data, |value, key| value.as_object()?.get(key))
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a value: strings raw, everything else as JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
