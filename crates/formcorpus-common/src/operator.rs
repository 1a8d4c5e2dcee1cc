use std::fmt;

/// Operators recognised by the token encoding.
///
/// Values start at 1; `0` is reserved for "unknown" in the packed code and
/// 15 is the largest value that fits the 4-bit operator field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OperatorKind {
    Plus = 1,
    Minus = 2,
    Divide = 3,
    Multiply = 4,
    Exponent = 5,
    Concat = 6,
    Equal = 7,
    NotEqual = 8,
    Less = 9,
    Greater = 10,
    LessEqual = 11,
    GreaterEqual = 12,
    Open = 13,
    Close = 14,
    Sep = 15,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 15] = [
        OperatorKind::Plus,
        OperatorKind::Minus,
        OperatorKind::Divide,
        OperatorKind::Multiply,
        OperatorKind::Exponent,
        OperatorKind::Concat,
        OperatorKind::Equal,
        OperatorKind::NotEqual,
        OperatorKind::Less,
        OperatorKind::Greater,
        OperatorKind::LessEqual,
        OperatorKind::GreaterEqual,
        OperatorKind::Open,
        OperatorKind::Close,
        OperatorKind::Sep,
    ];

    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "+" => Self::Plus,
            "-" => Self::Minus,
            "/" => Self::Divide,
            "*" => Self::Multiply,
            "^" => Self::Exponent,
            "&" => Self::Concat,
            "=" => Self::Equal,
            "<>" => Self::NotEqual,
            "<" => Self::Less,
            ">" => Self::Greater,
            "<=" => Self::LessEqual,
            ">=" => Self::GreaterEqual,
            "(" => Self::Open,
            ")" => Self::Close,
            "," => Self::Sep,
            _ => return None,
        })
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Divide => "/",
            Self::Multiply => "*",
            Self::Exponent => "^",
            Self::Concat => "&",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Open => "(",
            Self::Close => ")",
            Self::Sep => ",",
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        code.checked_sub(1)
            .and_then(|i| Self::ALL.get(i as usize))
            .copied()
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
