//! 条件语法分析
//!
//! 递归下降解析，优先级从低到高为 OR、AND、NOT。外层括号作为普通分组处理，
//! 所以任意层数的完整包裹括号都会被剥离。生成的语法树尚未绑定字段和类型。
//!
//! 括号与 NOT 的嵌套层数受 [`MAX_NESTING_DEPTH`] 限制，超出时报语法错误。

use crate::error::CompilationError;
use crate::lexer::{Token, TokenKind};
use crate::operators::CompareOp;

/// 未解析的字面量原文
#[derive(Debug, Clone, PartialEq)]
pub struct RawLiteral {
    pub text: String,
    pub quoted: bool,
    pub position: usize,
}

/// 属性路径（点号分隔的各段，原样保留大小写）
#[derive(Debug, Clone, PartialEq)]
pub struct RawPath {
    pub segments: Vec<String>,
    pub position: usize,
}

impl RawPath {
    pub fn text(&self) -> String {
        self.segments.join(".")
    }
}

/// 语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
    Compare {
        path: RawPath,
        operator: CompareOp,
        literal: RawLiteral,
    },
    Like {
        path: RawPath,
        pattern: String,
    },
    In {
        path: RawPath,
        negated: bool,
        values: Vec<RawLiteral>,
    },
    IsNull {
        path: RawPath,
        negated: bool,
    },
}

/// 括号与 NOT 合计允许的最大嵌套层数
///
/// 每层括号在谓词 JSON 中最多展开为 OR 与 AND 两级分组，该上限保证持久化形式
/// 始终低于 serde_json 的递归限制。
pub const MAX_NESTING_DEPTH: usize = 25;

pub fn parse(tokens: &[Token]) -> Result<Clause, CompilationError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let clause = parser.parse_or()?;

    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(syntax(
            trailing.position,
            format!("unexpected {}", describe(&trailing.kind)),
        ));
    }

    Ok(clause)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &'t Token {
        // 词元序列总以 Eof 结尾
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<&'t Token, CompilationError> {
        let token = self.peek();
        if &token.kind == kind {
            Ok(self.advance())
        } else {
            Err(syntax(
                token.position,
                format!("expected {}, found {}", what, describe(&token.kind)),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Clause, CompilationError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            terms.push(self.parse_and()?);
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Clause::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Clause, CompilationError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&TokenKind::And) {
            terms.push(self.parse_unary()?);
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Clause::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Clause, CompilationError> {
        let position = self.peek().position;

        if self.eat(&TokenKind::Not) {
            self.descend(position)?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Clause::Not(Box::new(operand)));
        }

        if self.eat(&TokenKind::LParen) {
            self.descend(position)?;
            let inner = self.parse_or()?;
            self.expect(&TokenKind::RParen, "')'")?;
            self.depth -= 1;
            return Ok(inner);
        }

        self.parse_comparison()
    }

    fn descend(&mut self, position: usize) -> Result<(), CompilationError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(syntax(
                position,
                format!(
                    "condition nests too deeply (at most {} levels)",
                    MAX_NESTING_DEPTH
                ),
            ));
        }
        Ok(())
    }

    fn parse_comparison(&mut self) -> Result<Clause, CompilationError> {
        let path = self.parse_path()?;
        let token = self.advance();

        match &token.kind {
            TokenKind::Compare(operator) => Ok(Clause::Compare {
                path,
                operator: *operator,
                literal: self.parse_literal(false)?,
            }),
            TokenKind::Like => {
                let pattern = self.peek();
                match &pattern.kind {
                    TokenKind::Str(text) => {
                        self.advance();
                        Ok(Clause::Like {
                            path,
                            pattern: text.clone(),
                        })
                    }
                    other => Err(syntax(
                        pattern.position,
                        format!("LIKE requires a quoted pattern, found {}", describe(other)),
                    )),
                }
            }
            TokenKind::Not => {
                self.expect(&TokenKind::In, "IN after NOT")?;
                self.parse_in_list(path, true)
            }
            TokenKind::In => self.parse_in_list(path, false),
            TokenKind::Is => {
                let negated = self.eat(&TokenKind::Not);
                self.expect(&TokenKind::Null, "NULL")?;
                Ok(Clause::IsNull { path, negated })
            }
            other => Err(syntax(
                token.position,
                format!(
                    "expected comparison operator after '{}', found {}",
                    path.text(),
                    describe(other)
                ),
            )),
        }
    }

    fn parse_path(&mut self) -> Result<RawPath, CompilationError> {
        let first = self.advance();
        let TokenKind::Ident(name) = &first.kind else {
            return Err(syntax(
                first.position,
                format!("expected property name, found {}", describe(&first.kind)),
            ));
        };

        let mut segments = vec![name.clone()];
        while self.eat(&TokenKind::Dot) {
            let token = self.advance();
            match &token.kind {
                TokenKind::Ident(segment) => segments.push(segment.clone()),
                other => {
                    return Err(syntax(
                        token.position,
                        format!("expected property name after '.', found {}", describe(other)),
                    ));
                }
            }
        }

        Ok(RawPath {
            segments,
            position: first.position,
        })
    }

    fn parse_in_list(&mut self, path: RawPath, negated: bool) -> Result<Clause, CompilationError> {
        self.expect(&TokenKind::LParen, "'(' after IN")?;

        let mut values = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                values.push(self.parse_literal(true)?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RParen, "',' or ')' in IN list")?;
                break;
            }
        }

        Ok(Clause::In {
            path,
            negated,
            values,
        })
    }

    /// 字面量：引号字符串、数字、`true`/`false`；IN 列表中额外允许裸标识符
    fn parse_literal(&mut self, allow_bare_word: bool) -> Result<RawLiteral, CompilationError> {
        let token = self.advance();
        let (text, quoted) = match &token.kind {
            TokenKind::Str(text) => (text.clone(), true),
            TokenKind::Number(text) => (text.clone(), false),
            TokenKind::Ident(word)
                if allow_bare_word
                    || word.eq_ignore_ascii_case("true")
                    || word.eq_ignore_ascii_case("false") =>
            {
                (word.clone(), false)
            }
            other => {
                return Err(syntax(
                    token.position,
                    format!("expected literal, found {}", describe(other)),
                ));
            }
        };

        Ok(RawLiteral {
            text,
            quoted,
            position: token.position,
        })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Str(text) => format!("string '{}'", text),
        TokenKind::Number(text) => format!("number {}", text),
        TokenKind::Compare(op) => format!("operator '{}'", op),
        TokenKind::And => "AND".to_string(),
        TokenKind::Or => "OR".to_string(),
        TokenKind::Not => "NOT".to_string(),
        TokenKind::Like => "LIKE".to_string(),
        TokenKind::In => "IN".to_string(),
        TokenKind::Is => "IS".to_string(),
        TokenKind::Null => "NULL".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

fn syntax(position: usize, message: String) -> CompilationError {
    CompilationError::Syntax { position, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_text(input: &str) -> Result<Clause, CompilationError> {
        parse(&tokenize(input)?)
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_comparison() {
        let clause = parse_text("noteType = 'Intake Note'").unwrap();

        match clause {
            Clause::Compare {
                path: p,
                operator,
                literal,
            } => {
                assert_eq!(p.segments, path(&["noteType"]));
                assert_eq!(operator, CompareOp::Eq);
                assert_eq!(literal.text, "Intake Note");
                assert!(literal.quoted);
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_outer_parentheses_are_stripped() {
        let plain = parse_text("a = '1' and b = '2'").unwrap();
        let wrapped = parse_text("((a = '1' and b = '2'))").unwrap();

        assert_eq!(plain, wrapped);
    }

    #[test]
    fn test_partial_parentheses_are_kept() {
        let clause = parse_text("(a = '1') or (b = '2' and c = '3')").unwrap();

        match clause {
            Clause::Or(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[1], Clause::And(_)));
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let clause = parse_text("a = '1' or b = '2' and c = '3'").unwrap();

        match clause {
            Clause::Or(terms) => {
                assert!(matches!(terms[0], Clause::Compare { .. }));
                assert!(matches!(&terms[1], Clause::And(inner) if inner.len() == 2));
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_not_in_and_is_not_null() {
        let clause = parse_text("score not in ('1', 2) and name is not null").unwrap();

        let Clause::And(terms) = clause else {
            panic!("expected AND");
        };
        match &terms[0] {
            Clause::In {
                negated, values, ..
            } => {
                assert!(*negated);
                assert_eq!(values.len(), 2);
                assert!(values[0].quoted);
                assert!(!values[1].quoted);
            }
            other => panic!("unexpected clause: {:?}", other),
        }
        assert!(matches!(terms[1], Clause::IsNull { negated: true, .. }));
    }

    #[test]
    fn test_nested_path() {
        let clause = parse_text("provider.address.city like 'Spring%'").unwrap();

        match clause {
            Clause::Like { path: p, pattern } => {
                assert_eq!(p.segments, path(&["provider", "address", "city"]));
                assert_eq!(pattern, "Spring%");
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_empty_in_list_parses() {
        let clause = parse_text("score in ()").unwrap();
        assert!(matches!(clause, Clause::In { ref values, .. } if values.is_empty()));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse_text("(a = '1'").unwrap_err();
        assert!(err.to_string().contains("expected ')'"));

        let err = parse_text("a = '1')").unwrap_err();
        assert!(err.to_string().contains("unexpected ')'"));
    }

    #[test]
    fn test_missing_operator() {
        let err = parse_text("noteType 'x'").unwrap_err();
        assert!(err.to_string().contains("expected comparison operator"));
    }

    #[test]
    fn test_bare_word_only_in_lists() {
        assert!(parse_text("credentials in (MD, DO)").is_ok());
        assert!(parse_text("flag = true").is_ok());
        assert!(parse_text("noteType = Intake").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let wrapped =
            |depth: usize| format!("{}a = '1'{}", "(".repeat(depth), ")".repeat(depth));

        assert!(parse_text(&wrapped(MAX_NESTING_DEPTH)).is_ok());

        let err = parse_text(&wrapped(MAX_NESTING_DEPTH + 1)).unwrap_err();
        assert!(matches!(
            err,
            CompilationError::Syntax { position, .. } if position == MAX_NESTING_DEPTH
        ));
        assert!(err.to_string().contains("condition nests too deeply"));

        // 极深输入返回错误而不是耗尽栈
        assert!(parse_text(&wrapped(200_000)).is_err());

        let negated = format!("{}a = '1'", "not ".repeat(MAX_NESTING_DEPTH));
        assert!(matches!(parse_text(&negated).unwrap(), Clause::Not(_)));
        let negated = format!("{}a = '1'", "not ".repeat(MAX_NESTING_DEPTH + 1));
        assert!(parse_text(&negated).is_err());
    }

    #[test]
    fn test_nesting_depth_resets_between_siblings() {
        let wrapped = |depth: usize, inner: &str| {
            format!("{}{}{}", "(".repeat(depth), inner, ")".repeat(depth))
        };
        let deepest = wrapped(MAX_NESTING_DEPTH, "a = '1'");
        let negated = wrapped(MAX_NESTING_DEPTH - 1, "b = '2'");
        let text = format!("{deepest} and {deepest} or not {negated}");

        assert!(parse_text(&text).is_ok());
    }
}
