use std::{collections::HashMap, fmt, iter::Peekable, str::CharIndices, str::FromStr};

use crate::error::ExpressionError;

type ExprResult<T> = std::result::Result<T, ExpressionError>;

/// Deepest nesting of parentheses, signs and powers accepted by the parser.
pub const MAX_DEPTH: usize = 256;
/// Longest token sequence accepted by the parser.
pub const MAX_TOKENS: usize = 4096;

/// Named numeric values available to an expression.
pub type Bindings = HashMap<String, f64>;

/// Parsed math expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Remainder with the sign of the divisor.
    Mod,
    Pow,
}

/// Parse and numerically evaluate `input` with no bound symbols.
pub fn evaluate(input: &str) -> ExprResult<f64> {
    evaluate_with(input, &Bindings::new())
}

/// Parse and numerically evaluate `input`, resolving symbols from `bindings`.
pub fn evaluate_with(input: &str, bindings: &Bindings) -> ExprResult<f64> {
    input.parse::<Expr>()?.eval(bindings)
}

impl Expr {
    /// Evaluate the expression to a finite floating point value.
    ///
    /// Symbols are looked up in `bindings` first, then among the constants `pi` and `E`.
    pub fn eval(&self, bindings: &Bindings) -> ExprResult<f64> {
        let value = self.eval_raw(bindings)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExpressionError::NonFinite)
        }
    }

    fn eval_raw(&self, bindings: &Bindings) -> ExprResult<f64> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Symbol(name) => lookup_symbol(name, bindings),
            Expr::Neg(inner) => Ok(-inner.eval_raw(bindings)?),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval_raw(bindings)?;
                let rhs = rhs.eval_raw(bindings)?;
                Ok(match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                    BinaryOp::Mod => lhs - rhs * (lhs / rhs).floor(),
                    BinaryOp::Pow => lhs.powf(rhs),
                })
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.eval_raw(bindings))
                    .collect::<ExprResult<Vec<_>>>()?;
                call_function(name, &args)
            }
        }
    }
}

fn lookup_symbol(name: &str, bindings: &Bindings) -> ExprResult<f64> {
    if let Some(value) = bindings.get(name) {
        return Ok(*value);
    }
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "E" => Ok(std::f64::consts::E),
        _ => Err(ExpressionError::UnknownIdentifier(name.to_string())),
    }
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(ExpressionError::Arity {
            name: name.to_string(),
            expected: "1",
            found: args.len(),
        }),
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "sqrt" => unary(f64::sqrt),
        "abs" | "Abs" => unary(f64::abs),
        "floor" => unary(f64::floor),
        "ceiling" => unary(f64::ceil),
        // log(x) is natural, log(x, b) is base b
        "log" => match args {
            [x] => Ok(x.ln()),
            [x, base] => Ok(x.ln() / base.ln()),
            _ => Err(ExpressionError::Arity {
                name: name.to_string(),
                expected: "1 or 2",
                found: args.len(),
            }),
        },
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}

impl FromStr for Expr {
    type Err = ExpressionError;

    fn from_str(input: &str) -> ExprResult<Self> {
        let tokens = tokenize(input)?;
        if tokens.len() > MAX_TOKENS {
            return Err(ExpressionError::TooLong(MAX_TOKENS));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;

        match parser.peek() {
            None => Ok(expr),
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                token: token.to_string(),
                position: *position,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// Both `^` and `**`.
    Power,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{value}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Power => write!(f, "**"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

fn tokenize(input: &str) -> ExprResult<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        let token = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => lex_number(input, &mut chars)?,
            c if c.is_alphabetic() || c == '_' => {
                let end = advance_while(input, &mut chars, |c| c.is_alphanumeric() || c == '_');
                Token::Ident(input[position..end].to_string())
            }
            '*' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    Token::Power
                } else {
                    Token::Star
                }
            }
            _ => {
                chars.next();
                match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Power,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => return Err(ExpressionError::UnexpectedChar { ch, position }),
                }
            }
        };
        tokens.push((token, position));
    }

    Ok(tokens)
}

/// Consume characters while `pred` holds and return the end byte offset.
fn advance_while(
    input: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    mut pred: impl FnMut(char) -> bool,
) -> usize {
    while let Some(&(_, c)) = chars.peek() {
        if !pred(c) {
            break;
        }
        chars.next();
    }
    chars.peek().map(|(i, _)| *i).unwrap_or(input.len())
}

fn lex_number(input: &str, chars: &mut Peekable<CharIndices<'_>>) -> ExprResult<Token> {
    let start = chars.peek().map(|(i, _)| *i).unwrap_or(input.len());
    let mut seen_dot = false;
    let mut end = advance_while(input, chars, |c| {
        if c == '.' && !seen_dot {
            seen_dot = true;
            true
        } else {
            c.is_ascii_digit()
        }
    });

    // Exponent only when followed by digits, so `2E` stays a number and a constant.
    let mut ahead = chars.clone();
    if let Some((_, 'e' | 'E')) = ahead.next() {
        if let Some((_, '+' | '-')) = ahead.peek() {
            ahead.next();
        }
        if matches!(ahead.peek(), Some((_, c)) if c.is_ascii_digit()) {
            *chars = ahead;
            end = advance_while(input, chars, |c| c.is_ascii_digit());
        }
    }

    let literal = &input[start..end];
    literal
        .parse::<f64>()
        .map(Token::Number)
        .map_err(|_| ExpressionError::InvalidNumber(literal.to_string()))
}

/// Recursive descent parser with the usual precedence:
/// `+ -` < `* / %` < unary `-` < `**` (right associative).
struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Current recursion depth, every nested construct passes through `unary`.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(Token, usize)> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        match self.peek() {
            Some((token, _)) if token == expected => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: Token) -> ExprResult<()> {
        match self.next() {
            Some((token, _)) if token == expected => Ok(()),
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                token: token.to_string(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Slash) {
                BinaryOp::Div
            } else if self.eat(&Token::Percent) {
                BinaryOp::Mod
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }

        let expr = if self.eat(&Token::Minus) {
            Expr::Neg(Box::new(self.unary()?))
        } else if self.eat(&Token::Plus) {
            self.unary()?
        } else {
            self.power()?
        };

        self.depth -= 1;
        Ok(expr)
    }

    fn power(&mut self) -> ExprResult<Expr> {
        let base = self.atom()?;
        if self.eat(&Token::Power) {
            // The exponent may carry its own sign: 2**-1
            let exponent = self.unary()?;
            Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> ExprResult<Expr> {
        match self.next() {
            Some((Token::Number(value), _)) => Ok(Expr::Number(value)),
            Some((Token::Ident(name), _)) => {
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Some((Token::LParen, _)) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                token: token.to_string(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> ExprResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }
}
