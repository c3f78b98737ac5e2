//! Hand-written longest-match lexer for the configuration file format.
//!
//! The input is treated as an 8-bit-clean byte stream (assumed to be a
//! superset of ASCII); bytes `0x80..=0xFF` are identifier characters. The
//! lexer is greedy, deterministic, and allocation-free: every token borrows
//! its text from the input buffer.

/// Classification of one lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier: `[A-Za-z_\x80-\xFF][A-Za-z0-9_\x80-\xFF]*`.
    Ident,
    /// Two identifiers joined by a single dot.
    QualifiedIdent,
    /// Optional sign, decimal or `0x` hex digits, optional unit letters.
    Integer,
    /// Optional sign, digits around a dot, optional signed exponent.
    Real,
    /// Single-quoted string, surrounding quotes included in the text.
    QuotedString,
    /// Identifier-like run that also contains `- . _ : /` characters.
    UnquotedString,
    /// A literal `=`.
    Equals,
    /// A literal newline; advances the line counter.
    Eol,
    /// Any byte that fits no other rule.
    Junk,
}

/// One token, borrowing its text from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
    /// 1-based line the token starts on.
    pub line: u32,
}

impl Token<'_> {
    /// Token text as an owned string (lossy for non-UTF-8 bytes).
    #[must_use]
    pub fn text_string(&self) -> String {
        String::from_utf8_lossy(self.text).into_owned()
    }
}

const fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

const fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

const fn is_word_cont(b: u8) -> bool {
    is_ident_cont(b) || matches!(b, b'-' | b'.' | b':' | b'/')
}

/// Token scanner over one configuration file's bytes.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Current 1-based line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            match self.input.get(self.pos)? {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        let start = self.pos;
        let line = self.line;
        let kind = match self.input[start] {
            b'\n' => {
                self.pos += 1;
                self.line += 1;
                TokenKind::Eol
            }
            b'=' => {
                self.pos += 1;
                TokenKind::Equals
            }
            b'\'' => self.scan_quoted(),
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.scan_number(),
            b if is_ident_start(b) => self.scan_word(),
            _ => {
                self.pos += 1;
                TokenKind::Junk
            }
        };

        Some(Token {
            kind,
            text: &self.input[start..self.pos],
            line,
        })
    }

    /// Scan a single-quoted string starting at the opening quote.
    ///
    /// Body bytes may be anything except an unescaped quote, backslash, or
    /// newline; a backslash escapes any following non-newline byte, and a
    /// doubled quote stands for one quote. An unterminated string degrades
    /// to a single junk byte (the quote), which the parser reports as a
    /// syntax error on this line.
    fn scan_quoted(&mut self) -> TokenKind {
        let mut i = self.pos + 1;
        loop {
            match self.input.get(i) {
                None | Some(b'\n') => {
                    self.pos += 1;
                    return TokenKind::Junk;
                }
                Some(b'\\') => {
                    if matches!(self.input.get(i + 1), None | Some(b'\n')) {
                        self.pos += 1;
                        return TokenKind::Junk;
                    }
                    i += 2;
                }
                Some(b'\'') => {
                    if self.input.get(i + 1) == Some(&b'\'') {
                        i += 2;
                    } else {
                        self.pos = i + 1;
                        return TokenKind::QuotedString;
                    }
                }
                Some(_) => i += 1,
            }
        }
    }

    /// Scan a numeric token, taking the longer of the integer and real
    /// matches (first rule wins on a tie, so integers beat reals).
    fn scan_number(&mut self) -> TokenKind {
        let rest = &self.input[self.pos..];
        let mut body = 0;
        if matches!(rest.first(), Some(b'+' | b'-')) {
            body = 1;
        }

        let int_len = Self::match_integer(&rest[body..]);
        let real_len = Self::match_real(&rest[body..]);

        if int_len == 0 && real_len == 0 {
            // Lone sign (or lone dot handled by match_real): junk byte.
            self.pos += 1;
            return TokenKind::Junk;
        }
        if int_len >= real_len {
            self.pos += body + int_len;
            TokenKind::Integer
        } else {
            self.pos += body + real_len;
            TokenKind::Real
        }
    }

    /// Length matched by `({digit}+|0x{hexdigit}+){unit_letter}*`, or 0.
    fn match_integer(s: &[u8]) -> usize {
        let digits = |s: &[u8], pred: fn(&u8) -> bool| s.iter().take_while(|b| pred(b)).count();

        // Plain decimal digits, then unit letters. A leading "0x" without
        // hex digits still lands here: "0" plus unit letter "x".
        let dec = digits(s, u8::is_ascii_digit);
        let mut best = 0;
        if dec > 0 {
            best = dec + digits(&s[dec..], u8::is_ascii_alphabetic);
        }

        if s.len() > 2 && s[0] == b'0' && (s[1] == b'x' || s[1] == b'X') {
            let hex = digits(&s[2..], u8::is_ascii_hexdigit);
            if hex > 0 {
                let end = 2 + hex;
                best = best.max(end + digits(&s[end..], u8::is_ascii_alphabetic));
            }
        }
        best
    }

    /// Length matched by `{digit}*"."{digit}*([Ee][+-]?{digit}+)?`, or 0.
    fn match_real(s: &[u8]) -> usize {
        let int_part = s.iter().take_while(|b| b.is_ascii_digit()).count();
        if s.get(int_part) != Some(&b'.') {
            return 0;
        }
        let mut end = int_part + 1;
        end += s[end..].iter().take_while(|b| b.is_ascii_digit()).count();

        // Exponent only counts when complete: marker, optional sign, digits.
        let exp = &s[end..];
        if matches!(exp.first(), Some(b'E' | b'e')) {
            let mut j = 1;
            if matches!(exp.get(j), Some(b'+' | b'-')) {
                j += 1;
            }
            let exp_digits = exp[j..].iter().take_while(|b| b.is_ascii_digit()).count();
            if exp_digits > 0 {
                end += j + exp_digits;
            }
        }
        end
    }

    /// Scan a maximal identifier-like run and classify it.
    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.input.len() && is_word_cont(self.input[self.pos]) {
            self.pos += 1;
        }
        Self::classify_word(&self.input[start..self.pos])
    }

    /// First-rule-wins classification of a maximal word: a pure identifier
    /// is `Ident`, exactly `ID.ID` is `QualifiedIdent`, anything else is
    /// `UnquotedString`.
    fn classify_word(text: &[u8]) -> TokenKind {
        if text.iter().all(|&b| is_ident_cont(b)) {
            return TokenKind::Ident;
        }
        let mut dots = text.split(|&b| b == b'.');
        if let (Some(class), Some(local), None) = (dots.next(), dots.next(), dots.next()) {
            let valid = |seg: &[u8]| {
                !seg.is_empty()
                    && is_ident_start(seg[0])
                    && seg.iter().all(|&b| is_ident_cont(b))
            };
            if valid(class) && valid(local) {
                return TokenKind::QualifiedIdent;
            }
        }
        TokenKind::UnquotedString
    }
}
