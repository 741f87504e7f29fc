//! The parser: hand-written recursive descent over [`Lexer`] tokens,
//! implementing the grammar of spec §6.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::{id, Id};

use super::ast::*;
use super::lex::{parse_int_literal, LexError, Lexer, Token, TokenKind};

#[derive(Display)]
#[display("Parse error: {}", self.0)]
pub struct ParseError(String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> ParseError {
        ParseError(e.to_string())
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn new(input: &'src str) -> PResult<Parser<'src>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next()? {
            tokens.push(tok);
        }
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token<'src>> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(ParseError(format!(
                "expected {kind}, found {} ('{}')",
                tok.kind, tok.text
            ))),
            None => Err(ParseError(format!("expected {kind}, found end of input"))),
        }
    }

    fn expect_ident(&mut self) -> PResult<Id> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok(id(tok.text))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // CompUnit ::= (Decl | FuncDef)*
    fn parse_comp_unit(&mut self) -> PResult<CompUnit> {
        let mut items = Vec::new();
        while !self.at_end() {
            items.push(self.parse_item()?);
        }
        Ok(CompUnit { items })
    }

    fn parse_item(&mut self) -> PResult<Item> {
        if self.peek_kind() == Some(TokenKind::Const) {
            return Ok(Item::Decl(self.parse_decl(true)?));
        }
        // Btype ident ...: could be a FuncDef (`ident (`) or a Decl.
        let is_void = self.peek_kind() == Some(TokenKind::Void);
        if is_void {
            self.advance();
            return Ok(Item::FuncDef(self.parse_func_def_after_type(FuncRetType::Void)?));
        }
        self.expect(TokenKind::Int)?;
        let ident = self.expect_ident()?;
        if self.peek_kind() == Some(TokenKind::LParen) {
            return Ok(Item::FuncDef(
                self.parse_func_def_rest(FuncRetType::Int, ident)?,
            ));
        }
        let def = self.parse_def_rest(ident, true)?;
        let decl = self.parse_decl_rest(false, def)?;
        Ok(Item::Decl(decl))
    }

    // Decl ::= ConstDecl | VarDecl ; both are `[const] int Def (, Def)* ;`
    fn parse_decl(&mut self, is_const: bool) -> PResult<Decl> {
        if is_const {
            self.expect(TokenKind::Const)?;
        }
        self.expect(TokenKind::Int)?;
        let ident = self.expect_ident()?;
        let def = self.parse_def_rest(ident, is_const)?;
        self.parse_decl_rest(is_const, def)
    }

    fn parse_decl_rest(&mut self, is_const: bool, first: Def) -> PResult<Decl> {
        let mut defs = vec![first];
        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance();
            let ident = self.expect_ident()?;
            defs.push(self.parse_def_rest(ident, is_const)?);
        }
        self.expect(TokenKind::Semi)?;
        Ok(Decl { is_const, defs })
    }

    // Continues a Def after `ident` has already been consumed: dims, then
    // an optional (const declarations: mandatory) initializer.
    fn parse_def_rest(&mut self, ident: Id, is_const: bool) -> PResult<Def> {
        let mut dims = Vec::new();
        while self.peek_kind() == Some(TokenKind::LBracket) {
            self.advance();
            dims.push(self.parse_exp()?);
            self.expect(TokenKind::RBracket)?;
        }
        let init = if is_const {
            self.expect(TokenKind::Assign)?;
            Some(self.parse_init_val()?)
        } else if self.peek_kind() == Some(TokenKind::Assign) {
            self.advance();
            Some(self.parse_init_val()?)
        } else {
            None
        };
        Ok(Def { ident, dims, init })
    }

    // InitVal ::= Exp | '{' (InitVal (',' InitVal)*)? '}'
    fn parse_init_val(&mut self) -> PResult<InitVal> {
        if self.peek_kind() == Some(TokenKind::LBrace) {
            self.advance();
            let mut items = Vec::new();
            if self.peek_kind() != Some(TokenKind::RBrace) {
                items.push(self.parse_init_val()?);
                while self.peek_kind() == Some(TokenKind::Comma) {
                    self.advance();
                    items.push(self.parse_init_val()?);
                }
            }
            self.expect(TokenKind::RBrace)?;
            Ok(InitVal::List(items))
        } else {
            Ok(InitVal::Exp(self.parse_exp()?))
        }
    }

    fn parse_func_def_after_type(&mut self, ret_type: FuncRetType) -> PResult<FuncDef> {
        let ident = self.expect_ident()?;
        self.parse_func_def_rest(ret_type, ident)
    }

    // FuncDef ::= (int|void) ident '(' [FuncFParams] ')' Block
    fn parse_func_def_rest(&mut self, ret_type: FuncRetType, ident: Id) -> PResult<FuncDef> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.peek_kind() != Some(TokenKind::RParen) {
            self.expect(TokenKind::Int)?;
            params.push(self.expect_ident()?);
            while self.peek_kind() == Some(TokenKind::Comma) {
                self.advance();
                self.expect(TokenKind::Int)?;
                params.push(self.expect_ident()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FuncDef {
            ret_type,
            ident,
            params,
            body,
        })
    }

    // Block ::= '{' BlockItem* '}'
    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while self.peek_kind() != Some(TokenKind::RBrace) {
            items.push(self.parse_block_item()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> PResult<BlockItem> {
        match self.peek_kind() {
            Some(TokenKind::Const) => Ok(BlockItem::Decl(self.parse_decl(true)?)),
            Some(TokenKind::Int) => Ok(BlockItem::Decl(self.parse_decl(false)?)),
            _ => Ok(BlockItem::Stmt(self.parse_stmt()?)),
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            Some(TokenKind::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(TokenKind::If) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.peek_kind() == Some(TokenKind::Else) {
                    self.advance();
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Some(TokenKind::While) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Some(TokenKind::Break) => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Break)
            }
            Some(TokenKind::Continue) => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Continue)
            }
            Some(TokenKind::Return) => {
                self.advance();
                if self.peek_kind() == Some(TokenKind::Semi) {
                    self.advance();
                    Ok(Stmt::Return(None))
                } else {
                    let exp = self.parse_exp()?;
                    self.expect(TokenKind::Semi)?;
                    Ok(Stmt::Return(Some(exp)))
                }
            }
            Some(TokenKind::Semi) => {
                self.advance();
                Ok(Stmt::Exp(None))
            }
            _ => {
                let exp = self.parse_exp()?;
                if self.peek_kind() == Some(TokenKind::Assign) {
                    let lval = match exp {
                        Exp::LVal(lval) => lval,
                        _ => {
                            return Err(ParseError(
                                "left-hand side of an assignment must be an lvalue".into(),
                            ))
                        }
                    };
                    self.advance();
                    let rhs = self.parse_exp()?;
                    self.expect(TokenKind::Semi)?;
                    Ok(Stmt::Assign { lval, exp: rhs })
                } else {
                    self.expect(TokenKind::Semi)?;
                    Ok(Stmt::Exp(Some(exp)))
                }
            }
        }
    }

    fn parse_exp(&mut self) -> PResult<Exp> {
        self.parse_lor()
    }

    fn parse_lor(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_land()?;
        while self.peek_kind() == Some(TokenKind::OrOr) {
            self.advance();
            let rhs = self.parse_land()?;
            lhs = Exp::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_land(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_eq()?;
        while self.peek_kind() == Some(TokenKind::AndAnd) {
            self.advance();
            let rhs = self.parse_eq()?;
            lhs = Exp::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_rel()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::EqEq) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_rel()?;
            lhs = Exp::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_add()?;
            lhs = Exp::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Exp::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<Exp> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Exp::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Exp> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Minus),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Ok(Exp::Unary { op, operand });
        }
        self.parse_primary()
    }

    // PrimaryExp ::= '(' Exp ')' | Number | ident ('(' [FuncRParams] ')' | ('[' Exp ']')*)
    fn parse_primary(&mut self) -> PResult<Exp> {
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                let exp = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                Ok(exp)
            }
            Some(TokenKind::Num) => {
                let tok = self.advance().unwrap();
                Ok(Exp::Number(parse_int_literal(tok.text)))
            }
            Some(TokenKind::Ident) => {
                let ident = self.expect_ident()?;
                if self.peek_kind() == Some(TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek_kind() != Some(TokenKind::RParen) {
                        args.push(self.parse_exp()?);
                        while self.peek_kind() == Some(TokenKind::Comma) {
                            self.advance();
                            args.push(self.parse_exp()?);
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(Exp::Call { ident, args })
                } else {
                    let mut indices = Vec::new();
                    while self.peek_kind() == Some(TokenKind::LBracket) {
                        self.advance();
                        indices.push(self.parse_exp()?);
                        self.expect(TokenKind::RBracket)?;
                    }
                    Ok(Exp::LVal(LVal { ident, indices }))
                }
            }
            Some(kind) => Err(ParseError(format!("unexpected token {kind}"))),
            None => Err(ParseError("unexpected end of input".into())),
        }
    }
}

pub fn parse(input: &str) -> Result<CompUnit, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse_comp_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_main() {
        let unit = parse("int main() { return 0; }").unwrap();
        assert_eq!(unit.items.len(), 1);
        match &unit.items[0] {
            Item::FuncDef(f) => {
                assert_eq!(f.ret_type, FuncRetType::Int);
                assert_eq!(f.body.items.len(), 1);
            }
            _ => panic!("expected a FuncDef"),
        }
    }

    #[test]
    fn binds_precedence_correctly() {
        let unit = parse("int main() { return 1 + 2 * 3; }").unwrap();
        let Item::FuncDef(f) = &unit.items[0] else { panic!() };
        let BlockItem::Stmt(Stmt::Return(Some(exp))) = &f.body.items[0] else { panic!() };
        match exp {
            Exp::Binary { op: BinaryOp::Add, rhs, .. } => {
                assert!(matches!(**rhs, Exp::Binary { op: BinaryOp::Mul, .. }));
            }
            _ => panic!("expected a top-level Add"),
        }
    }

    #[test]
    fn distinguishes_call_from_array_index() {
        let unit = parse("int main() { int a[2]; return f(a[0]); }").unwrap();
        let Item::FuncDef(f) = &unit.items[0] else { panic!() };
        let BlockItem::Stmt(Stmt::Return(Some(Exp::Call { args, .. }))) = &f.body.items[1] else {
            panic!()
        };
        assert!(matches!(&args[0], Exp::LVal(LVal { indices, .. }) if indices.len() == 1));
    }

    #[test]
    fn rejects_non_lvalue_assignment_target() {
        assert!(parse("int main() { 1 = 2; return 0; }").is_err());
    }

    #[test]
    fn parses_global_array_with_nested_initializer() {
        let unit = parse("const int a[2][2] = {1, {2, 3}};").unwrap();
        assert_eq!(unit.items.len(), 1);
    }
}
