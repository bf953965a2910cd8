//! SQL token scanner
//!
//! A deliberately shallow lexer: it knows just enough SQL to tell which
//! keywords sit at the top level of a statement. String literals, quoted
//! identifiers and comments are skipped whole, and every token carries the
//! parenthesis depth it was found at.

use std::iter::Peekable;
use std::str::CharIndices;

// ============================================================================
// TOKEN TYPES
// ============================================================================

/// A positional parameter marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `?`
    Question,
    /// `$3`, `@p3`. `prefix_len` is the byte length of the part before the digits.
    Numbered { prefix_len: usize, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword, identifier or function name.
    Word,
    /// `"x"`, `` `x` `` or `[x]`.
    QuotedIdent,
    /// `'x'`
    StringLit,
    Number,
    Placeholder(Marker),
    LParen,
    RParen,
    Comma,
    Star,
    /// Operators and any other punctuation.
    Other,
}

/// One token with its byte span in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Parenthesis nesting depth. A closing paren has the depth of its opener.
    pub depth: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// True for a bare word equal to `keyword`, ignoring ASCII case.
    pub fn is_word(&self, source: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(keyword)
    }

    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }
}

// ============================================================================
// SCANNER
// ============================================================================

pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
            depth: 0,
        }
    }

    /// Scan the entire source.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let depth = self.depth;
        let c = self.peek_char()?;

        let (kind, depth) = match c {
            '\'' => {
                self.skip_quoted('\'');
                (TokenKind::StringLit, depth)
            }
            '"' => {
                self.skip_quoted('"');
                (TokenKind::QuotedIdent, depth)
            }
            '`' => {
                self.skip_quoted('`');
                (TokenKind::QuotedIdent, depth)
            }
            '[' => {
                self.skip_quoted(']');
                (TokenKind::QuotedIdent, depth)
            }
            '(' => {
                self.advance();
                self.depth += 1;
                (TokenKind::LParen, depth)
            }
            ')' => {
                self.advance();
                self.depth = self.depth.saturating_sub(1);
                (TokenKind::RParen, self.depth)
            }
            ',' => {
                self.advance();
                (TokenKind::Comma, depth)
            }
            '*' => {
                self.advance();
                (TokenKind::Star, depth)
            }
            '?' => {
                self.advance();
                (TokenKind::Placeholder(Marker::Question), depth)
            }
            '$' => (self.scan_numbered_marker(1), depth),
            '@' => {
                if matches!(self.peek_next_char(), Some('p') | Some('P')) {
                    (self.scan_numbered_marker(2), depth)
                } else {
                    self.advance();
                    self.skip_word_chars();
                    (TokenKind::Other, depth)
                }
            }
            c if c.is_ascii_digit() => {
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() || c == '.' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                (TokenKind::Number, depth)
            }
            c if c.is_alphabetic() || c == '_' => {
                self.skip_word_chars();
                (TokenKind::Word, depth)
            }
            _ => {
                self.advance();
                (TokenKind::Other, depth)
            }
        };

        Some(Token {
            kind,
            start,
            end: self.pos,
            depth,
        })
    }

    /// Consume a `$n` or `@pn` marker. Without digits it is plain punctuation.
    fn scan_numbered_marker(&mut self, prefix_len: usize) -> TokenKind {
        for _ in 0..prefix_len {
            self.advance();
        }
        let digits_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        match self.source[digits_start..self.pos].parse::<usize>() {
            Ok(index) => TokenKind::Placeholder(Marker::Numbered { prefix_len, index }),
            Err(_) => {
                self.skip_word_chars();
                TokenKind::Other
            }
        }
    }

    fn skip_word_chars(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skip a quoted run. A doubled closing quote is an escaped quote.
    fn skip_quoted(&mut self, close: char) {
        self.advance(); // opening quote
        while let Some(c) = self.advance() {
            if c == close {
                if self.peek_char() == Some(close) {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.peek_next_char() == Some('-') => {
                    // Line comment
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next_char() == Some('*') => {
                    // Block comment
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek_char() {
                            None => break,
                            Some('*') if self.peek_next_char() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }
}

/// Scan `source` into tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    Scanner::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_level_words(sql: &str) -> Vec<String> {
        tokenize(sql)
            .into_iter()
            .filter(|t| t.kind == TokenKind::Word && t.is_top_level())
            .map(|t| t.text(sql).to_ascii_uppercase())
            .collect()
    }

    #[test]
    fn test_words_inside_literals_are_skipped() {
        let sql = "SELECT 'a FROM b', \"FROM\" FROM t";
        assert_eq!(top_level_words(sql), vec!["SELECT", "FROM", "T"]);
    }

    #[test]
    fn test_doubled_quote_escape() {
        let sql = "SELECT 'it''s FROM' FROM t";
        assert_eq!(top_level_words(sql), vec!["SELECT", "FROM", "T"]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let sql = "SELECT a -- FROM x\n/* FROM y */ FROM t";
        assert_eq!(top_level_words(sql), vec!["SELECT", "A", "FROM", "T"]);
    }

    #[test]
    fn test_subquery_depth() {
        let sql = "SELECT (SELECT 1 FROM u) FROM t";
        let tokens = tokenize(sql);
        let froms: Vec<usize> = tokens
            .iter()
            .filter(|t| t.is_word(sql, "from"))
            .map(|t| t.depth)
            .collect();
        assert_eq!(froms, vec![1, 0]);
        let parens: Vec<(TokenKind, usize)> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::LParen | TokenKind::RParen))
            .map(|t| (t.kind, t.depth))
            .collect();
        assert_eq!(
            parens,
            vec![(TokenKind::LParen, 0), (TokenKind::RParen, 0)]
        );
    }

    #[test]
    fn test_bracket_and_backtick_identifiers() {
        let sql = "SELECT [from], `where` FROM t";
        assert_eq!(top_level_words(sql), vec!["SELECT", "FROM", "T"]);
    }

    #[test]
    fn test_placeholders() {
        let sql = "a = ? AND b = $2 AND c = @p10 AND d = '?' AND @var = 1";
        let markers: Vec<Marker> = tokenize(sql)
            .into_iter()
            .filter_map(|t| match t.kind {
                TokenKind::Placeholder(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(
            markers,
            vec![
                Marker::Question,
                Marker::Numbered {
                    prefix_len: 1,
                    index: 2
                },
                Marker::Numbered {
                    prefix_len: 2,
                    index: 10
                },
            ]
        );
    }

    #[test]
    fn test_unterminated_literal_consumes_rest() {
        let sql = "SELECT 'oops FROM t";
        assert_eq!(top_level_words(sql), vec!["SELECT"]);
    }
}
