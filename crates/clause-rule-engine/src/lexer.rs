//! 条件文本词法分析
//!
//! 在切分词元的同时完成操作符规范化：单词形式的比较符（`greaterthan` 等）、
//! `!=` / `<>`、`&&` / `||` / `!` 以及大小写不同的 AND/OR/NOT 都映射为同一种词元。

use crate::error::CompilationError;
use crate::operators::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// 单引号字符串，`''` 已还原为 `'`
    Str(String),
    /// 未加引号的数字字面量，保留原文
    Number(String),
    Compare(CompareOp),
    And,
    Or,
    Not,
    Like,
    In,
    Is,
    Null,
    LParen,
    RParen,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 字节偏移
    pub position: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, CompilationError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, CompilationError> {
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '(' => self.single(pos, TokenKind::LParen),
                ')' => self.single(pos, TokenKind::RParen),
                ',' => self.single(pos, TokenKind::Comma),
                '.' => self.single(pos, TokenKind::Dot),
                '\'' => self.string(pos)?,
                '=' | '!' | '<' | '>' | '&' | '|' => self.symbol(pos)?,
                '-' | '+' => self.signed_number(pos)?,
                c if c.is_ascii_digit() => self.number(pos),
                c if c.is_alphabetic() || c == '_' => self.word(pos),
                other => {
                    return Err(syntax(pos, format!("unexpected character '{}'", other)));
                }
            }
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            position: self.input.len(),
        });
        Ok(self.tokens)
    }

    fn push(&mut self, position: usize, kind: TokenKind) {
        self.tokens.push(Token { kind, position });
    }

    fn single(&mut self, position: usize, kind: TokenKind) {
        self.chars.next();
        self.push(position, kind);
    }

    fn string(&mut self, start: usize) -> Result<(), CompilationError> {
        self.chars.next();
        let mut value = String::new();

        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    if matches!(self.chars.peek(), Some((_, '\''))) {
                        self.chars.next();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some((_, c)) => value.push(c),
                None => return Err(syntax(start, "unterminated string literal")),
            }
        }

        self.push(start, TokenKind::Str(value));
        Ok(())
    }

    fn symbol(&mut self, start: usize) -> Result<(), CompilationError> {
        let mut symbol = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !matches!(c, '=' | '!' | '<' | '>' | '&' | '|') {
                break;
            }
            let mut candidate = symbol.clone();
            candidate.push(c);
            if !is_symbol_prefix(&candidate) {
                break;
            }
            symbol = candidate;
            self.chars.next();
        }

        let kind = match symbol.as_str() {
            "&&" => TokenKind::And,
            "||" => TokenKind::Or,
            "!" => TokenKind::Not,
            other => match CompareOp::from_symbol(other) {
                Some(op) => TokenKind::Compare(op),
                None => {
                    return Err(syntax(start, format!("unknown operator '{}'", other)));
                }
            },
        };

        self.push(start, kind);
        Ok(())
    }

    fn signed_number(&mut self, start: usize) -> Result<(), CompilationError> {
        let rest = &self.input[start + 1..];
        if !rest.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Err(syntax(start, "sign must be followed by a number"));
        }
        self.number(start);
        Ok(())
    }

    fn number(&mut self, start: usize) {
        let mut end = start;
        let mut prev = '\0';
        while let Some(&(pos, c)) = self.chars.peek() {
            let accepted = c.is_ascii_digit()
                || c == '.'
                || c == 'e'
                || c == 'E'
                || ((c == '-' || c == '+') && (pos == start || prev == 'e' || prev == 'E'));
            if !accepted {
                break;
            }
            prev = c;
            end = pos + c.len_utf8();
            self.chars.next();
        }

        let text = self.input[start..end].to_string();
        self.push(start, TokenKind::Number(text));
    }

    fn word(&mut self, start: usize) {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            end = pos + c.len_utf8();
            self.chars.next();
        }

        let word = &self.input[start..end];
        let kind = match word.to_ascii_lowercase().as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "like" => TokenKind::Like,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "null" => TokenKind::Null,
            lowered => match CompareOp::from_word(lowered) {
                Some(op) => TokenKind::Compare(op),
                None => TokenKind::Ident(word.to_string()),
            },
        };

        self.push(start, kind);
    }
}

fn is_symbol_prefix(candidate: &str) -> bool {
    matches!(
        candidate,
        "=" | "==" | "!" | "!=" | "<" | "<=" | "<>" | ">" | ">=" | "&" | "&&" | "|" | "||"
    )
}

fn syntax(position: usize, message: impl Into<String>) -> CompilationError {
    CompilationError::Syntax {
        position,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_comparison_tokens() {
        assert_eq!(
            kinds("noteType = 'Intake Note'"),
            vec![
                TokenKind::Ident("noteType".to_string()),
                TokenKind::Compare(CompareOp::Eq),
                TokenKind::Str("Intake Note".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operator_normalization() {
        assert_eq!(kinds("a != '1'")[1], TokenKind::Compare(CompareOp::Neq));
        assert_eq!(kinds("a <> '1'")[1], TokenKind::Compare(CompareOp::Neq));
        assert_eq!(kinds("a notequal '1'")[1], TokenKind::Compare(CompareOp::Neq));
        assert_eq!(
            kinds("a GreaterThanOrEqual 5")[1],
            TokenKind::Compare(CompareOp::Gte)
        );
        assert_eq!(kinds("a<=5")[1], TokenKind::Compare(CompareOp::Lte));
    }

    #[test]
    fn test_boolean_keywords_ignore_case() {
        let tokens = kinds("a = '1' aNd b = '2' OR NOT c IS null");
        assert!(tokens.contains(&TokenKind::And));
        assert!(tokens.contains(&TokenKind::Or));
        assert!(tokens.contains(&TokenKind::Not));
        assert!(tokens.contains(&TokenKind::Is));
        assert!(tokens.contains(&TokenKind::Null));

        let symbolic = kinds("a = '1' && !b = '2' || c = '3'");
        assert!(symbolic.contains(&TokenKind::And));
        assert!(symbolic.contains(&TokenKind::Not));
        assert!(symbolic.contains(&TokenKind::Or));
    }

    #[test]
    fn test_numbers_and_paths() {
        assert_eq!(
            kinds("provider.age >= -1.5e3"),
            vec![
                TokenKind::Ident("provider".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("age".to_string()),
                TokenKind::Compare(CompareOp::Gte),
                TokenKind::Number("-1.5e3".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(kinds("name = 'O''Brien'")[2], TokenKind::Str("O'Brien".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("name = 'abc").unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("name = #").unwrap_err();
        assert!(matches!(err, CompilationError::Syntax { position: 7, .. }));
    }
}
