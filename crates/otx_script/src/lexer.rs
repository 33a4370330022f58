use chumsky::prelude::*;

use crate::tokens::Token;

pub(crate) fn lexer(
) -> impl Parser<char, Vec<(Token, std::ops::Range<usize>)>, Error = Simple<char>> {
    let int = text::int(10).try_map(|digits: String, span| {
        digits
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| Simple::custom(span, "integer literal out of range"))
    });

    let escape = just('\\').ignore_then(choice::<_, Simple<char>>((
        just('"'),
        just('\\'),
        just('n').to('\n'),
        just('t').to('\t'),
    )));

    let string = just('"')
        .ignore_then(
            filter(|c: &char| *c != '"' && *c != '\\')
                .or(escape)
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'))
        .map(Token::Str);

    let word = text::ident().map(Token::from_word);

    let op = choice::<_, Simple<char>>(vec![
        just("==").to(Token::CmpEq).boxed(),
        just("!=").to(Token::CmpNeq).boxed(),
        just(">=").to(Token::CmpGte).boxed(),
        just("<=").to(Token::CmpLte).boxed(),
        just("&&").to(Token::AndAnd).boxed(),
        just("||").to(Token::OrOr).boxed(),
        just("+=").to(Token::PlusAssign).boxed(),
        just("-=").to(Token::MinusAssign).boxed(),
        just(">").to(Token::CmpGt).boxed(),
        just("<").to(Token::CmpLt).boxed(),
        just("=").to(Token::Assign).boxed(),
        just("+").to(Token::Plus).boxed(),
        just("-").to(Token::Minus).boxed(),
        just("*").to(Token::Star).boxed(),
        just("/").to(Token::Slash).boxed(),
        just("%").to(Token::Percent).boxed(),
        just("!").to(Token::Bang).boxed(),
        just("(").to(Token::LParen).boxed(),
        just(")").to(Token::RParen).boxed(),
        just("{").to(Token::LBrace).boxed(),
        just("}").to(Token::RBrace).boxed(),
        just(",").to(Token::Comma).boxed(),
        just(";").to(Token::Semi).boxed(),
    ]);

    let comment = just("//")
        .then(filter(|c: &char| *c != '\n').repeated())
        .ignored();
    let whitespace = filter(|c: &char| c.is_whitespace()).ignored();
    let trivia = comment.or(whitespace).repeated();

    let token = choice::<_, Simple<char>>((word, int, string, op))
        .map_with_span(|tok, span| (tok, span));

    trivia
        .clone()
        .ignore_then(token.then_ignore(trivia).repeated())
        .then_ignore(end())
}
