//! SQL Lexer - Tokenizes SQL input text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the SQL input
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// SQL reserved keyword
    Keyword(Keyword),
    /// Identifier such as table name or column name, case preserved
    Ident(String),
    /// String literal, quotes removed
    String(String),
    /// Numeric literal (integer or decimal)
    Number(String),
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Period,
    Asterisk,
    Plus,
    Minus,
    Slash,
    Equal,
    GreaterThan,
    LessThan,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Period => ".",
            Token::Asterisk => "*",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Slash => "/",
            Token::Equal => "=",
            Token::GreaterThan => ">",
            Token::LessThan => "<",
        })
    }
}

macro_rules! keywords {
    ($($variant:ident => $text:literal,)*) => {
        /// SQL reserved keywords
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Keyword {
            $($variant,)*
        }

        impl Keyword {
            /// Attempts to parse a string as a keyword (case-insensitive)
            pub fn from_str(ident: &str) -> Option<Keyword> {
                Some(match ident.to_uppercase().as_ref() {
                    $($text => Keyword::$variant,)*
                    _ => return None,
                })
            }

            /// Returns the uppercase string representation of the keyword
            pub fn to_str(&self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text,)*
                }
            }
        }
    };
}

keywords! {
    // DDL
    Create => "CREATE",
    Database => "DATABASE",
    Table => "TABLE",
    Drop => "DROP",
    Alter => "ALTER",
    Add => "ADD",
    Column => "COLUMN",
    Use => "USE",
    If => "IF",
    Exists => "EXISTS",
    // Constraints
    Not => "NOT",
    Null => "NULL",
    Default => "DEFAULT",
    Primary => "PRIMARY",
    Foreign => "FOREIGN",
    Key => "KEY",
    Unique => "UNIQUE",
    AutoIncrement => "AUTO_INCREMENT",
    References => "REFERENCES",
    CurrentTimestamp => "CURRENT_TIMESTAMP",
    // DML
    Select => "SELECT",
    From => "FROM",
    Where => "WHERE",
    And => "AND",
    Or => "OR",
    Like => "LIKE",
    Inner => "INNER",
    Left => "LEFT",
    Outer => "OUTER",
    Join => "JOIN",
    On => "ON",
    Group => "GROUP",
    Having => "HAVING",
    Order => "ORDER",
    By => "BY",
    Asc => "ASC",
    Desc => "DESC",
    Limit => "LIMIT",
    Offset => "OFFSET",
    As => "AS",
    Insert => "INSERT",
    Into => "INTO",
    Values => "VALUES",
    Update => "UPDATE",
    Set => "SET",
    Delete => "DELETE",
    // Transactions
    Start => "START",
    Begin => "BEGIN",
    Transaction => "TRANSACTION",
    Commit => "COMMIT",
    Rollback => "ROLLBACK",
    // Literals
    True => "TRUE",
    False => "FALSE",
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// SQL lexical analyzer (lexer/tokenizer)
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Parse(format!("Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given SQL text
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Peeks and consumes if the character maps to a token (for single-char tokens)
    fn next_if_token<F: Fn(char) -> Option<Token>>(&mut self, predicate: F) -> Option<Token> {
        let token = self.iter.peek().and_then(|c| predicate(*c))?;
        self.iter.next();
        Some(token)
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some('\'') | Some('"') => self.scan_string(),
            Some('`') => self.scan_quoted_ident(),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans a string literal enclosed in single or double quotes.
    /// A doubled quote inside the literal stands for one quote character.
    fn scan_string(&mut self) -> Result<Option<Token>> {
        let Some(quote) = self.iter.next() else {
            return Ok(None);
        };
        let mut val = String::new();
        loop {
            match self.iter.next() {
                Some(c) if c == quote => {
                    if self.next_if(|c| c == quote).is_some() {
                        val.push(quote);
                    } else {
                        break;
                    }
                }
                Some(c) => val.push(c),
                None => return Err(Error::Parse("Unexpected end of string".into())),
            }
        }
        Ok(Some(Token::String(val)))
    }

    /// Scans a backtick-quoted identifier
    fn scan_quoted_ident(&mut self) -> Result<Option<Token>> {
        self.iter.next();
        let mut val = String::new();
        loop {
            match self.iter.next() {
                Some('`') => break,
                Some(c) => val.push(c),
                None => return Err(Error::Parse("Unexpected end of quoted identifier".into())),
            }
        }
        Ok(Some(Token::Ident(val)))
    }

    /// Scans a numeric literal (integer or decimal)
    fn scan_number(&mut self) -> Option<Token> {
        let mut val = self.next_while(|c| c.is_ascii_digit())?;
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        Some(Token::Number(val))
    }

    /// Scans an identifier or keyword
    fn scan_ident(&mut self) -> Option<Token> {
        let mut val = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    /// Scans a single-character symbol token
    fn scan_symbol(&mut self) -> Option<Token> {
        self.next_if_token(|c| match c {
            '*' => Some(Token::Asterisk),
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '.' => Some(Token::Period),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '=' => Some(Token::Equal),
            '>' => Some(Token::GreaterThan),
            '<' => Some(Token::LessThan),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        error::Result,
        sql::parser::lexer::{Keyword, Token},
    };

    #[test]
    fn test_lexer_create_table() -> Result<()> {
        let tokens = Lexer::new(
            "CREATE table tbl
                (
                    id INT primary key auto_increment,
                    price DECIMAL(10,2)
                );
                ",
        )
        .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Create),
                Token::Keyword(Keyword::Table),
                Token::Ident("tbl".to_string()),
                Token::OpenParen,
                Token::Ident("id".to_string()),
                Token::Ident("INT".to_string()),
                Token::Keyword(Keyword::Primary),
                Token::Keyword(Keyword::Key),
                Token::Keyword(Keyword::AutoIncrement),
                Token::Comma,
                Token::Ident("price".to_string()),
                Token::Ident("DECIMAL".to_string()),
                Token::OpenParen,
                Token::Number("10".to_string()),
                Token::Comma,
                Token::Number("2".to_string()),
                Token::CloseParen,
                Token::CloseParen,
                Token::Semicolon
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_insert_into() -> Result<()> {
        let tokens = Lexer::new("insert into `Tbl` values (1, 'it''s', \"x\", true, 4.55);")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Insert),
                Token::Keyword(Keyword::Into),
                Token::Ident("Tbl".to_string()),
                Token::Keyword(Keyword::Values),
                Token::OpenParen,
                Token::Number("1".to_string()),
                Token::Comma,
                Token::String("it's".to_string()),
                Token::Comma,
                Token::String("x".to_string()),
                Token::Comma,
                Token::Keyword(Keyword::True),
                Token::Comma,
                Token::Number("4.55".to_string()),
                Token::CloseParen,
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_select() -> Result<()> {
        let tokens = Lexer::new("select * from t where t.id > 1")
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Asterisk,
                Token::Keyword(Keyword::From),
                Token::Ident("t".to_string()),
                Token::Keyword(Keyword::Where),
                Token::Ident("t".to_string()),
                Token::Period,
                Token::Ident("id".to_string()),
                Token::GreaterThan,
                Token::Number("1".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("select 'open").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("select # from t").collect::<Result<Vec<_>>>().is_err());
    }
}
