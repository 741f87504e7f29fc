//! The lexer.

use derive_more::Display;
use regex::Regex;

/// A lexed token: its class and the exact source slice it was matched from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
}

/// Token classes. Keywords are distinguished from plain identifiers after
/// matching, not by separate regexes, so `integer` never gets misread as
/// `int` + `eger`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("int")]
    Int,
    #[display("void")]
    Void,
    #[display("const")]
    Const,
    #[display("if")]
    If,
    #[display("else")]
    Else,
    #[display("while")]
    While,
    #[display("break")]
    Break,
    #[display("continue")]
    Continue,
    #[display("return")]
    Return,
    #[display("ident")]
    Ident,
    #[display("num")]
    Num,
    #[display("&&")]
    AndAnd,
    #[display("||")]
    OrOr,
    #[display("==")]
    EqEq,
    #[display("!=")]
    Ne,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("=")]
    Assign,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,
    #[display("%")]
    Percent,
    #[display("!")]
    Not,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display(",")]
    Comma,
    #[display(";")]
    Semi,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::Int),
    ("void", TokenKind::Void),
    ("const", TokenKind::Const),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("return", TokenKind::Return),
];

pub struct LexError(usize, char);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected character {:?} at byte {}", self.1, self.0)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    ident_re: Regex,
    num_re: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        // Longer operators must be tried before their prefixes (`<=` before `<`).
        let matchers = vec![
            (Regex::new(r"\A&&").unwrap(), TokenKind::AndAnd),
            (Regex::new(r"\A\|\|").unwrap(), TokenKind::OrOr),
            (Regex::new(r"\A==").unwrap(), TokenKind::EqEq),
            (Regex::new(r"\A!=").unwrap(), TokenKind::Ne),
            (Regex::new(r"\A<=").unwrap(), TokenKind::Le),
            (Regex::new(r"\A>=").unwrap(), TokenKind::Ge),
            (Regex::new(r"\A<").unwrap(), TokenKind::Lt),
            (Regex::new(r"\A>").unwrap(), TokenKind::Gt),
            (Regex::new(r"\A=").unwrap(), TokenKind::Assign),
            (Regex::new(r"\A\+").unwrap(), TokenKind::Plus),
            (Regex::new(r"\A-").unwrap(), TokenKind::Minus),
            (Regex::new(r"\A\*").unwrap(), TokenKind::Star),
            (Regex::new(r"\A/").unwrap(), TokenKind::Slash),
            (Regex::new(r"\A%").unwrap(), TokenKind::Percent),
            (Regex::new(r"\A!").unwrap(), TokenKind::Not),
            (Regex::new(r"\A\(").unwrap(), TokenKind::LParen),
            (Regex::new(r"\A\)").unwrap(), TokenKind::RParen),
            (Regex::new(r"\A\{").unwrap(), TokenKind::LBrace),
            (Regex::new(r"\A\}").unwrap(), TokenKind::RBrace),
            (Regex::new(r"\A\[").unwrap(), TokenKind::LBracket),
            (Regex::new(r"\A\]").unwrap(), TokenKind::RBracket),
            (Regex::new(r"\A,").unwrap(), TokenKind::Comma),
            (Regex::new(r"\A;").unwrap(), TokenKind::Semi),
        ];
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://[^\n]*)|(?:/\*(?s:.)*?\*/))*").unwrap(),
            ident_re: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            num_re: Regex::new(r"\A(?:0[xX][0-9a-fA-F]+|0[0-7]*|[1-9][0-9]*)").unwrap(),
            matchers,
        }
    }

    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end();
        }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];

        if let Some(m) = self.ident_re.find(rest) {
            let text = m.as_str();
            let kind = KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == text)
                .map(|(_, k)| *k)
                .unwrap_or(TokenKind::Ident);
            self.pos += m.end();
            return Ok(Some(Token { kind, text }));
        }

        if let Some(m) = self.num_re.find(rest) {
            let text = m.as_str();
            self.pos += m.end();
            return Ok(Some(Token {
                kind: TokenKind::Num,
                text,
            }));
        }

        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let text = m.as_str();
                self.pos += m.end();
                return Ok(Some(Token { kind: *kind, text }));
            }
        }

        Err(LexError(self.pos, rest.chars().next().unwrap()))
    }
}

/// Parses a SysY integer literal (decimal, `0`-prefixed octal, or
/// `0x`-prefixed hex) into its 32-bit value.
pub fn parse_int_literal(text: &str) -> i32 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i32::from_str_radix(hex, 16).unwrap_or_else(|_| u32::from_str_radix(hex, 16).unwrap() as i32)
    } else if text.len() > 1 && text.starts_with('0') {
        i32::from_str_radix(text, 8).unwrap_or_else(|_| u32::from_str_radix(text, 8).unwrap() as i32)
    } else {
        text.parse::<i32>()
            .unwrap_or_else(|_| text.parse::<u32>().unwrap() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next().unwrap() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(kinds("int integer"), vec![TokenKind::Int, TokenKind::Ident]);
    }

    #[test]
    fn longest_operator_match_wins() {
        assert_eq!(
            kinds("<= < == = !="),
            vec![
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::EqEq,
                TokenKind::Assign,
                TokenKind::Ne
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            kinds("int // line comment\n x /* block\ncomment */ = 1;"),
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Num,
                TokenKind::Semi
            ]
        );
    }

    #[test]
    fn numeric_literal_bases() {
        assert_eq!(parse_int_literal("42"), 42);
        assert_eq!(parse_int_literal("010"), 8);
        assert_eq!(parse_int_literal("0x2A"), 42);
        assert_eq!(parse_int_literal("0"), 0);
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let mut lexer = Lexer::new("@");
        assert!(lexer.next().is_err());
    }
}
