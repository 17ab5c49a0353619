//! Metadata tokens.
//!
//! A token is a 32-bit reference to a row in a metadata table: the high byte names the table
//! and the low 24 bits hold the 1-based row index. Tokens identify types inside a module and,
//! together with the module's identity, inside the whole catalog.
//!
//! # Examples
//!
//! ```rust
//! use modscope::metadata::token::Token;
//!
//! let token = Token::new(0x0200_0005);
//! assert_eq!(token.table(), 0x02);
//! assert_eq!(token.row(), 5);
//! ```

use std::fmt;

/// Table byte of `TypeDef` tokens.
pub const TYPEDEF_TABLE: u8 = 0x02;

/// A metadata token (table in the high byte, 1-based row in the low 24 bits).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row index.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Raw token value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Table identifier.
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// 1-based row index.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` for the null token.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
