use chumsky::prelude::*;
use chumsky::Stream;

use crate::ast::*;
use crate::errors::{to_parse_error, ParseError};
use crate::lexer::lexer;
use crate::span::LineIndex;
use crate::tokens::Token;

pub fn parse_script(source: &str, file: &str) -> Result<Script, Vec<ParseError>> {
    let line_index = LineIndex::new(source);
    let (tokens, lex_errs) = lexer().parse_recovery(source);
    if !lex_errs.is_empty() {
        let errs = lex_errs
            .into_iter()
            .map(|e| to_parse_error(e, file, &line_index))
            .collect::<Vec<_>>();
        return Err(errs);
    }

    let tokens = tokens.unwrap_or_default();
    let char_len = source.chars().count();
    let span_end = char_len..char_len + 1;
    let stream = Stream::from_iter(span_end, tokens.into_iter());

    let ident = select! { Token::Ident(s) => s };

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Int(n) => Literal::Int(n),
            Token::Str(s) => Literal::Str(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
        }
        .map(|value| Expr::Literal { value });

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let call_or_var = ident
            .clone()
            .then(args.or_not())
            .map(|(name, args)| match args {
                Some(args) => Expr::Call { name, args },
                None => Expr::Var { name },
            });

        let atom = choice::<_, Simple<Token>>((
            literal,
            call_or_var,
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let unary = choice::<_, Simple<Token>>((
            just(Token::Bang).to(UnaryOp::Not),
            just(Token::Minus).to(UnaryOp::Neg),
        ))
        .repeated()
        .then(atom)
        .foldr(|op, operand| Expr::Unary {
            op,
            operand: Box::new(operand),
        });

        let product = binary_level(
            unary,
            choice::<_, Simple<Token>>((
                just(Token::Star).to(BinOp::Mul),
                just(Token::Slash).to(BinOp::Div),
                just(Token::Percent).to(BinOp::Rem),
            )),
        );
        let sum = binary_level(
            product,
            choice::<_, Simple<Token>>((
                just(Token::Plus).to(BinOp::Add),
                just(Token::Minus).to(BinOp::Sub),
            )),
        );
        let ordering = binary_level(
            sum,
            choice::<_, Simple<Token>>((
                just(Token::CmpGte).to(BinOp::Gte),
                just(Token::CmpGt).to(BinOp::Gt),
                just(Token::CmpLte).to(BinOp::Lte),
                just(Token::CmpLt).to(BinOp::Lt),
            )),
        );
        let equality = binary_level(
            ordering,
            choice::<_, Simple<Token>>((
                just(Token::CmpEq).to(BinOp::Eq),
                just(Token::CmpNeq).to(BinOp::Neq),
            )),
        );
        let and = binary_level(equality, just(Token::AndAnd).to(BinOp::And));
        binary_level(and, just(Token::OrOr).to(BinOp::Or))
    });

    let stmt = recursive(|stmt| {
        let block = stmt
            .clone()
            .repeated()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        let var_decl = just(Token::KwVar)
            .ignore_then(ident.clone())
            .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
            .then_ignore(just(Token::Semi))
            .map(|(name, init)| StmtKind::VarDecl { name, init });

        let assign_op = choice::<_, Simple<Token>>((
            just(Token::Assign).to(AssignOp::Set),
            just(Token::PlusAssign).to(AssignOp::Add),
            just(Token::MinusAssign).to(AssignOp::Sub),
        ));

        let assign = ident
            .clone()
            .then(assign_op)
            .then(expr.clone())
            .then_ignore(just(Token::Semi))
            .map(|((target, op), value)| StmtKind::Assign { target, op, value });

        let condition = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // `else if` chains parse as an else branch holding a single nested statement.
        let else_branch = just(Token::KwElse).ignore_then(choice::<_, Simple<Token>>((
            block.clone(),
            stmt.clone().map(|s| vec![s]),
        )));

        let if_stmt = just(Token::KwIf)
            .ignore_then(condition.clone())
            .then(block.clone())
            .then(else_branch.or_not())
            .map(|((cond, then_branch), else_branch)| StmtKind::If {
                cond,
                then_branch,
                else_branch,
            });

        let while_stmt = just(Token::KwWhile)
            .ignore_then(condition)
            .then(block)
            .map(|(cond, body)| StmtKind::While { cond, body });

        let return_stmt = just(Token::KwReturn)
            .ignore_then(expr.clone().or_not())
            .then_ignore(just(Token::Semi))
            .map(|value| StmtKind::Return { value });

        let expr_stmt = expr
            .clone()
            .then_ignore(just(Token::Semi))
            .map(|expr| StmtKind::Expr { expr });

        choice::<_, Simple<Token>>((
            var_decl,
            if_stmt,
            while_stmt,
            return_stmt,
            assign,
            expr_stmt,
        ))
        .map_with_span(|kind, span| Stmt {
            kind,
            span: line_index.span(file, span),
        })
    });

    let script = stmt.repeated().then_ignore(end());

    let (parsed, parse_errs) = script.parse_recovery(stream);
    if !parse_errs.is_empty() {
        let errs = parse_errs
            .into_iter()
            .map(|e| to_parse_error(e, file, &line_index))
            .collect::<Vec<_>>();
        return Err(errs);
    }

    Ok(Script {
        statements: parsed.unwrap_or_default(),
    })
}

/// Left-associative binary operator level over `operand`.
fn binary_level<P, O>(operand: P, op: O) -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone
where
    P: Parser<Token, Expr, Error = Simple<Token>> + Clone,
    O: Parser<Token, BinOp, Error = Simple<Token>> + Clone,
{
    operand
        .clone()
        .then(op.then(operand).repeated())
        .foldl(|lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
}
