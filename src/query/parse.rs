//! Parser for chained traversal expressions
//!
//! Accepts expressions of the form
//! `g.V("main").Out("has-var").Tag("var").All()`: a start step followed by
//! any number of `.Step(args)` calls and an optional trailing `;`.

use super::traverse::{Step, Terminal, TraversalQuery};
use super::types::{Direction, QueryError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(u64),
    Dot,
    LParen,
    RParen,
    Comma,
    Semi,
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(u64),
    Null,
}

fn syntax(offset: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                match chars.next() {
                    Some((_, '/')) => {
                        while let Some(&(_, c)) = chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            chars.next();
                        }
                    }
                    _ => return Err(syntax(pos, "unexpected '/'")),
                }
            }
            '.' => {
                chars.next();
                tokens.push((pos, Token::Dot));
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            ',' => {
                chars.next();
                tokens.push((pos, Token::Comma));
            }
            ';' => {
                chars.next();
                tokens.push((pos, Token::Semi));
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(syntax(pos, "unterminated string literal"));
                }
                tokens.push((pos, Token::Str(value)));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                let n = digits
                    .parse()
                    .map_err(|_| syntax(pos, "number out of range"))?;
                tokens.push((pos, Token::Num(n)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                tokens.push((pos, Token::Ident(ident)));
            }
            other => return Err(syntax(pos, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), QueryError> {
        let offset = self.offset();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(syntax(offset, format!("expected {}", what))),
        }
    }

    fn ident(&mut self) -> Result<String, QueryError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(syntax(offset, "expected identifier")),
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>, QueryError> {
        self.expect(Token::LParen, "'('")?;
        let mut args = Vec::new();

        if self.peek() == Some(&Token::RParen) {
            self.next();
            return Ok(args);
        }

        loop {
            let offset = self.offset();
            let arg = match self.next() {
                Some(Token::Str(s)) => Arg::Str(s),
                Some(Token::Num(n)) => Arg::Num(n),
                Some(Token::Ident(id)) if id == "null" || id == "undefined" => Arg::Null,
                _ => return Err(syntax(offset, "expected string, number or null")),
            };
            args.push(arg);

            let offset = self.offset();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(syntax(offset, "expected ',' or ')'")),
            }
        }

        Ok(args)
    }
}

fn strings(step: &str, args: Vec<Arg>) -> Result<Vec<String>, QueryError> {
    args.into_iter()
        .map(|a| match a {
            Arg::Str(s) => Ok(s),
            _ => Err(QueryError::BadArguments {
                step: step.to_string(),
                expected: "string arguments",
            }),
        })
        .collect()
}

fn single_string(step: &str, args: Vec<Arg>) -> Result<String, QueryError> {
    match <[Arg; 1]>::try_from(args) {
        Ok([Arg::Str(s)]) => Ok(s),
        _ => Err(QueryError::BadArguments {
            step: step.to_string(),
            expected: "one string",
        }),
    }
}

fn single_number(step: &str, args: Vec<Arg>) -> Result<usize, QueryError> {
    match <[Arg; 1]>::try_from(args) {
        Ok([Arg::Num(n)]) => Ok(n as usize),
        _ => Err(QueryError::BadArguments {
            step: step.to_string(),
            expected: "one number",
        }),
    }
}

fn follow(step: &str, direction: Direction, args: Vec<Arg>) -> Result<Step, QueryError> {
    let bad = || QueryError::BadArguments {
        step: step.to_string(),
        expected: "(predicate|null, tag?)",
    };

    let mut args = args.into_iter();
    let predicate = match args.next() {
        None | Some(Arg::Null) => None,
        Some(Arg::Str(p)) => Some(p),
        Some(Arg::Num(_)) => return Err(bad()),
    };
    let tag = match args.next() {
        None | Some(Arg::Null) => None,
        Some(Arg::Str(t)) => Some(t),
        Some(Arg::Num(_)) => return Err(bad()),
    };
    if args.next().is_some() {
        return Err(bad());
    }

    Ok(Step::Follow {
        direction,
        predicate,
        tag,
    })
}

/// Parse a traversal expression
pub(super) fn parse(input: &str) -> Result<TraversalQuery, QueryError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        end: input.len(),
    };

    match parser.next() {
        Some(Token::Ident(g)) if g == "g" || g == "graph" => {}
        _ => return Err(QueryError::MissingStart),
    }
    parser.expect(Token::Dot, "'.'")?;
    match parser.ident()?.as_str() {
        "V" | "Vertex" => {}
        _ => return Err(QueryError::MissingStart),
    }
    let start = strings("V", parser.args()?)?;

    let mut steps = Vec::new();
    let mut terminal = Terminal::All;

    while parser.peek() == Some(&Token::Dot) {
        parser.next();
        let name = parser.ident()?;
        let args = parser.args()?;

        let step = match name.as_str() {
            "Out" => follow(&name, Direction::Outgoing, args)?,
            "In" => follow(&name, Direction::Incoming, args)?,
            "Both" => follow(&name, Direction::Both, args)?,
            "OutPredicates" => Step::OutPredicates,
            "Has" => {
                let mut pair = strings(&name, args)?;
                if pair.len() != 2 {
                    return Err(QueryError::BadArguments {
                        step: "Has".to_string(),
                        expected: "(predicate, object)",
                    });
                }
                let object = pair.pop().unwrap_or_default();
                let predicate = pair.pop().unwrap_or_default();
                Step::Has { predicate, object }
            }
            "Is" => Step::Is(strings(&name, args)?),
            "Tag" | "As" => Step::Tag(single_string(&name, args)?),
            "Back" => Step::Back(single_string(&name, args)?),
            "Unique" => Step::Unique,
            "Skip" => Step::Skip(single_number(&name, args)?),
            "Limit" => Step::Limit(single_number(&name, args)?),
            "All" | "ToArray" => {
                terminal = Terminal::All;
                break;
            }
            "Count" => {
                terminal = Terminal::Count;
                break;
            }
            _ => return Err(QueryError::UnknownStep(name.clone())),
        };
        steps.push(step);
    }

    if parser.peek() == Some(&Token::Semi) {
        parser.next();
    }
    if parser.pos < parser.tokens.len() {
        return Err(syntax(parser.offset(), "unexpected trailing input"));
    }

    Ok(TraversalQuery {
        start,
        steps,
        terminal,
    })
}
