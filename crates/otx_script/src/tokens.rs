use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    KwVar,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    True,
    False,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Assign,
    PlusAssign,
    MinusAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    CmpEq,
    CmpNeq,
    CmpGt,
    CmpGte,
    CmpLt,
    CmpLte,
}

impl Token {
    pub(crate) fn from_word(word: String) -> Self {
        match word.as_str() {
            "var" => Token::KwVar,
            "if" => Token::KwIf,
            "else" => Token::KwElse,
            "while" => Token::KwWhile,
            "return" => Token::KwReturn,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(word),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier `{}`", s),
            Token::Int(n) => write!(f, "integer `{}`", n),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::KwVar => write!(f, "'var'"),
            Token::KwIf => write!(f, "'if'"),
            Token::KwElse => write!(f, "'else'"),
            Token::KwWhile => write!(f, "'while'"),
            Token::KwReturn => write!(f, "'return'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Comma => write!(f, "','"),
            Token::Semi => write!(f, "';'"),
            Token::Assign => write!(f, "'='"),
            Token::PlusAssign => write!(f, "'+='"),
            Token::MinusAssign => write!(f, "'-='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Bang => write!(f, "'!'"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::CmpEq => write!(f, "'=='"),
            Token::CmpNeq => write!(f, "'!='"),
            Token::CmpGt => write!(f, "'>'"),
            Token::CmpGte => write!(f, "'>='"),
            Token::CmpLt => write!(f, "'<'"),
            Token::CmpLte => write!(f, "'<='"),
        }
    }
}
