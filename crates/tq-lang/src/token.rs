use thiserror::Error;

/// A classified lexeme with its byte offset and byte length in the source
/// string. Offsets drive error reporting and let the chain parser slice the
/// raw `where(...)` body back out of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    // Comparison
    Gt,
    Ge,
    Lt,
    Le,
    EqEq,
    NotEq,
    // Logical
    Amp,
    Pipe,
    // Punctuation
    LParen,
    RParen,
    Comma,
    Dot,
}

impl TokenKind {
    /// Human-readable form used in "expected X but found Y" diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier {name:?}"),
            Self::Number(value) => format!("number {value}"),
            Self::Str(value) => format!("string {value:?}"),
            Self::Gt => "'>'".to_owned(),
            Self::Ge => "'>='".to_owned(),
            Self::Lt => "'<'".to_owned(),
            Self::Le => "'<='".to_owned(),
            Self::EqEq => "'=='".to_owned(),
            Self::NotEq => "'!='".to_owned(),
            Self::Amp => "'&'".to_owned(),
            Self::Pipe => "'|'".to_owned(),
            Self::LParen => "'('".to_owned(),
            Self::RParen => "')'".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Dot => "'.'".to_owned(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },
    #[error("unrecognized character {found:?} at position {position}")]
    UnrecognizedCharacter { position: usize, found: char },
    #[error("invalid number {text:?} at position {position}")]
    InvalidNumber { position: usize, text: String },
}

impl LexError {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::UnterminatedString { position }
            | Self::UnrecognizedCharacter { position, .. }
            | Self::InvalidNumber { position, .. } => *position,
        }
    }

    /// Shift the reported position; used when the lexed text was a slice of
    /// a larger expression.
    #[must_use]
    pub fn at_offset(self, offset: usize) -> Self {
        match self {
            Self::UnterminatedString { position } => Self::UnterminatedString {
                position: position + offset,
            },
            Self::UnrecognizedCharacter { position, found } => Self::UnrecognizedCharacter {
                position: position + offset,
                found,
            },
            Self::InvalidNumber { position, text } => Self::InvalidNumber {
                position: position + offset,
                text,
            },
        }
    }
}

/// Split an expression string into tokens.
///
/// Recognizes identifiers (`[A-Za-z_][A-Za-z0-9_]*`), numbers (optional
/// sign, digits, optional fraction), single- or double-quoted strings with
/// no escape processing, the comparison operators, `&`, `|`, and the
/// punctuation `( ) , .`. Whitespace between tokens is discarded. A `.` is
/// part of a number only when a digit follows, so the chain separator after
/// a numeric argument always lexes as punctuation.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let byte_at = |i: usize| {
        if i < chars.len() {
            chars[i].0
        } else {
            input.len()
        }
    };

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            ',' => {
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            '.' => {
                tokens.push(Token {
                    kind: TokenKind::Dot,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            '&' => {
                tokens.push(Token {
                    kind: TokenKind::Amp,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            '|' => {
                tokens.push(Token {
                    kind: TokenKind::Pipe,
                    pos,
                    len: 1,
                });
                i += 1;
            }
            '>' => {
                if chars.get(i + 1).is_some_and(|&(_, next)| next == '=') {
                    tokens.push(Token {
                        kind: TokenKind::Ge,
                        pos,
                        len: 2,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Gt,
                        pos,
                        len: 1,
                    });
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1).is_some_and(|&(_, next)| next == '=') {
                    tokens.push(Token {
                        kind: TokenKind::Le,
                        pos,
                        len: 2,
                    });
                    i += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Lt,
                        pos,
                        len: 1,
                    });
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1).is_some_and(|&(_, next)| next == '=') {
                    tokens.push(Token {
                        kind: TokenKind::EqEq,
                        pos,
                        len: 2,
                    });
                    i += 2;
                } else {
                    return Err(LexError::UnrecognizedCharacter {
                        position: pos,
                        found: '=',
                    });
                }
            }
            '!' => {
                if chars.get(i + 1).is_some_and(|&(_, next)| next == '=') {
                    tokens.push(Token {
                        kind: TokenKind::NotEq,
                        pos,
                        len: 2,
                    });
                    i += 2;
                } else {
                    return Err(LexError::UnrecognizedCharacter {
                        position: pos,
                        found: '!',
                    });
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut j = i + 1;
                while j < chars.len() && chars[j].1 != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(LexError::UnterminatedString { position: pos });
                }
                let value = input[byte_at(i + 1)..chars[j].0].to_owned();
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    pos,
                    len: byte_at(j + 1) - pos,
                });
                i = j + 1;
            }
            '+' | '-' => {
                if chars
                    .get(i + 1)
                    .is_some_and(|&(_, next)| next.is_ascii_digit())
                {
                    i = scan_number(input, &chars, i, &mut tokens)?;
                } else {
                    return Err(LexError::UnrecognizedCharacter {
                        position: pos,
                        found: c,
                    });
                }
            }
            _ if c.is_ascii_digit() => {
                i = scan_number(input, &chars, i, &mut tokens)?;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len() && {
                    let next = chars[j].1;
                    next.is_ascii_alphanumeric() || next == '_'
                } {
                    j += 1;
                }
                let end = byte_at(j);
                tokens.push(Token {
                    kind: TokenKind::Ident(input[pos..end].to_owned()),
                    pos,
                    len: end - pos,
                });
                i = j;
            }
            _ => {
                return Err(LexError::UnrecognizedCharacter {
                    position: pos,
                    found: c,
                });
            }
        }
    }
    Ok(tokens)
}

/// Scan `[+-]? digit+ ('.' digit+)?` starting at char index `start`.
/// Returns the char index after the number.
fn scan_number(
    input: &str,
    chars: &[(usize, char)],
    start: usize,
    tokens: &mut Vec<Token>,
) -> Result<usize, LexError> {
    let pos = chars[start].0;
    let mut j = start;
    if matches!(chars[j].1, '+' | '-') {
        j += 1;
    }
    while j < chars.len() && chars[j].1.is_ascii_digit() {
        j += 1;
    }
    // The decimal point belongs to the number only when a digit follows;
    // otherwise it is the chain separator.
    if j + 1 < chars.len() && chars[j].1 == '.' && chars[j + 1].1.is_ascii_digit() {
        j += 2;
        while j < chars.len() && chars[j].1.is_ascii_digit() {
            j += 1;
        }
    }

    let end = if j < chars.len() {
        chars[j].0
    } else {
        input.len()
    };
    let text = &input[pos..end];
    let value = text.parse::<f64>().map_err(|_| LexError::InvalidNumber {
        position: pos,
        text: text.to_owned(),
    })?;
    tokens.push(Token {
        kind: TokenKind::Number(value),
        pos,
        len: end - pos,
    });
    Ok(j)
}
