//! Parser and static type checker.
//!
//! Turns lexed items into a tree of [`Node`]s whose expressions are already
//! resolved against the function catalog and the fixed context fields. A
//! template that parses here can only fail at render time on values.

use crate::error::{TemplateError, TemplateResult};
use crate::funcs::{self, Func};
use crate::lex::{Item, Tok, Token};
use crate::value::{Ty, Value};

/// Context fields a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    GroupId,
    Seq,
    Random,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "GroupId" => Some(Field::GroupId),
            "Seq" => Some(Field::Seq),
            "Random" => Some(Field::Random),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Lit(Value),
    Field(Field),
    Call {
        func: &'static Func,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Print(Expr),
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Why a block stopped.
enum Stop {
    Eof,
    Else { offset: usize, chain: Option<Expr> },
    End { offset: usize },
}

enum Step {
    Node(Node),
    Stop(Stop),
}

const UNSUPPORTED_ACTIONS: &[&str] = &[
    "range", "with", "define", "template", "block", "break", "continue",
];

fn syntax(offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::syntax(offset, message)
}

pub(crate) fn parse(items: Vec<Item>) -> TemplateResult<Vec<Node>> {
    let mut parser = Parser {
        items: items.into_iter(),
    };
    let (nodes, stop) = parser.block()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::Else { offset, .. } => Err(syntax(offset, "unexpected {{else}}")),
        Stop::End { offset } => Err(syntax(offset, "unexpected {{end}}")),
    }
}

struct Parser {
    items: std::vec::IntoIter<Item>,
}

impl Parser {
    fn block(&mut self) -> TemplateResult<(Vec<Node>, Stop)> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            match item {
                Item::Text(text) => nodes.push(Node::Text(text)),
                Item::Action { tokens, offset } => match self.action(&tokens, offset)? {
                    Step::Node(node) => nodes.push(node),
                    Step::Stop(stop) => return Ok((nodes, stop)),
                },
            }
        }
        Ok((nodes, Stop::Eof))
    }

    fn action(&mut self, tokens: &[Token], offset: usize) -> TemplateResult<Step> {
        let keyword = match tokens.first() {
            Some(Token {
                kind: Tok::Ident(name),
                ..
            }) => Some(name.as_str()),
            _ => None,
        };

        match keyword {
            Some("if") => {
                let cond = Tokens::new(&tokens[1..], offset).whole("if")?;
                Ok(Step::Node(self.if_block(cond, offset)?))
            }
            Some("else") => match tokens.get(1) {
                None => Ok(Step::Stop(Stop::Else {
                    offset,
                    chain: None,
                })),
                Some(Token {
                    kind: Tok::Ident(kw),
                    ..
                }) if kw == "if" => {
                    let cond = Tokens::new(&tokens[2..], offset).whole("else if")?;
                    Ok(Step::Stop(Stop::Else {
                        offset,
                        chain: Some(cond),
                    }))
                }
                Some(tok) => Err(syntax(tok.offset, "unexpected token after else")),
            },
            Some("end") => match tokens.get(1) {
                None => Ok(Step::Stop(Stop::End { offset })),
                Some(tok) => Err(syntax(tok.offset, "unexpected token in end")),
            },
            Some(kw) if UNSUPPORTED_ACTIONS.contains(&kw) => {
                Err(syntax(offset, format!("{kw} actions are not supported")))
            }
            _ => {
                let expr = Tokens::new(tokens, offset).whole("command")?;
                Ok(Step::Node(Node::Print(expr)))
            }
        }
    }

    fn if_block(&mut self, cond: Expr, offset: usize) -> TemplateResult<Node> {
        let (then, stop) = self.block()?;
        let otherwise = match stop {
            Stop::End { .. } => Vec::new(),
            Stop::Else {
                offset,
                chain: Some(next),
            } => vec![self.if_block(next, offset)?],
            Stop::Else { chain: None, .. } => {
                let (nodes, stop) = self.block()?;
                match stop {
                    Stop::End { .. } => nodes,
                    Stop::Else { offset, .. } => {
                        return Err(syntax(offset, "expected end; found else"));
                    }
                    Stop::Eof => return Err(syntax(offset, "unexpected EOF: if is missing its end")),
                }
            }
            Stop::Eof => return Err(syntax(offset, "unexpected EOF: if is missing its end")),
        };
        Ok(Node::If {
            cond,
            then,
            otherwise,
        })
    }
}

/// Cursor over the tokens of one action.
struct Tokens<'a> {
    toks: &'a [Token],
    pos: usize,
    action_offset: usize,
}

impl<'a> Tokens<'a> {
    fn new(toks: &'a [Token], action_offset: usize) -> Self {
        Self {
            toks,
            pos: 0,
            action_offset,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn here(&self) -> usize {
        self.peek().map_or(self.action_offset, |t| t.offset)
    }

    /// Parse a pipeline that must consume every token of the action.
    fn whole(mut self, context: &str) -> TemplateResult<Expr> {
        if self.toks.is_empty() {
            return Err(syntax(
                self.action_offset,
                format!("missing value for {context}"),
            ));
        }
        let (expr, _) = self.pipeline()?;
        match self.peek() {
            None => Ok(expr),
            Some(tok) => Err(syntax(tok.offset, "unexpected token in action")),
        }
    }

    fn pipeline(&mut self) -> TemplateResult<(Expr, Ty)> {
        let mut acc = self.command(None)?;
        while matches!(self.peek(), Some(Token { kind: Tok::Pipe, .. })) {
            self.pos += 1;
            acc = self.command(Some(acc))?;
        }
        Ok(acc)
    }

    fn at_command_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token {
                kind: Tok::Pipe | Tok::RParen,
                ..
            })
        )
    }

    fn command(&mut self, piped: Option<(Expr, Ty)>) -> TemplateResult<(Expr, Ty)> {
        if self.at_command_end() {
            return Err(syntax(self.here(), "missing value for command"));
        }
        let head = match self.peek() {
            Some(tok) => tok,
            None => return Err(syntax(self.here(), "missing value for command")),
        };

        if let Tok::Ident(name) = &head.kind
            && !is_reserved_ident(name)
        {
            self.pos += 1;
            let func = funcs::lookup(name)
                .ok_or_else(|| syntax(head.offset, format!("function {name:?} not defined")))?;
            let mut args = Vec::new();
            let mut tys = Vec::new();
            while !self.at_command_end() {
                let (expr, ty) = self.operand()?;
                args.push(expr);
                tys.push(ty);
            }
            if let Some((expr, ty)) = piped {
                args.push(expr);
                tys.push(ty);
            }
            let ty = func.check(&tys).map_err(|m| syntax(head.offset, m))?;
            return Ok((Expr::Call { func, args }, ty));
        }

        let operand = self.operand()?;
        if piped.is_some() || !self.at_command_end() {
            return Err(syntax(head.offset, "can't give argument to non-function"));
        }
        Ok(operand)
    }

    fn operand(&mut self) -> TemplateResult<(Expr, Ty)> {
        let Some(tok) = self.bump() else {
            return Err(syntax(self.action_offset, "missing operand"));
        };
        match &tok.kind {
            Tok::Str(s) => Ok((Expr::Lit(Value::Str(s.clone())), Ty::Str)),
            Tok::Int(n) => Ok((Expr::Lit(Value::Int(*n)), Ty::Int)),
            Tok::Field(name) => Field::from_name(name)
                .map(|f| (Expr::Field(f), Ty::Str))
                .ok_or_else(|| {
                    syntax(
                        tok.offset,
                        format!("can't evaluate field {name}; available fields are GroupId, Seq and Random"),
                    )
                }),
            Tok::Dot => Err(syntax(
                tok.offset,
                "the bare context value cannot be used; reference .GroupId, .Seq or .Random",
            )),
            Tok::LParen => {
                let inner = self.pipeline()?;
                match self.bump() {
                    Some(Token {
                        kind: Tok::RParen, ..
                    }) => Ok(inner),
                    _ => Err(syntax(tok.offset, "unclosed left paren")),
                }
            }
            Tok::RParen => Err(syntax(tok.offset, "unexpected right paren")),
            Tok::Pipe => Err(syntax(tok.offset, "missing value for command")),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok((Expr::Lit(Value::Bool(true)), Ty::Bool)),
                "false" => Ok((Expr::Lit(Value::Bool(false)), Ty::Bool)),
                "nil" => Err(syntax(tok.offset, "nil is not supported")),
                other if funcs::lookup(other).is_some() => Err(syntax(
                    tok.offset,
                    format!("function {other:?} used as an argument; wrap the call in parentheses"),
                )),
                other if is_reserved_ident(other) => {
                    Err(syntax(tok.offset, format!("unexpected keyword {other:?}")))
                }
                other => Err(syntax(tok.offset, format!("function {other:?} not defined"))),
            },
        }
    }
}

fn is_reserved_ident(name: &str) -> bool {
    matches!(name, "true" | "false" | "nil" | "if" | "else" | "end")
        || UNSUPPORTED_ACTIONS.contains(&name)
}
