//! Tokenizer for the dictionary-level PDF syntax the indexer consumes.
//!
//! The cross-reference machinery only ever tokenizes trailer dictionaries,
//! xref stream dictionaries and the `N G obj` wrapper around them, so this
//! lexer covers the value syntax those can contain and nothing more (no
//! content-stream operators).
//!
//! Every function takes a borrowed byte window and returns the unconsumed
//! remainder; there is no shared cursor state, so concurrent parses over the
//! same buffer never observe each other's position.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g., 3.14, .5)
    Real(f64),
    /// Literal string bytes (content of "(...)", escapes not decoded)
    LiteralString(&'a [u8]),
    /// Hexadecimal string bytes (content of "<...>", not yet paired)
    HexString(&'a [u8]),
    /// Name without the leading / (e.g., "Prev" from "/Prev")
    Name(String),
    /// Boolean true keyword
    True,
    /// Boolean false keyword
    False,
    /// Null keyword
    Null,
    /// Array start delimiter [
    ArrayStart,
    /// Array end delimiter ]
    ArrayEnd,
    /// Dictionary start delimiter <<
    DictStart,
    /// Dictionary end delimiter >>
    DictEnd,
    /// Indirect object start keyword "obj"
    ObjStart,
    /// Indirect object end keyword "endobj"
    ObjEnd,
    /// Stream start keyword "stream"
    StreamStart,
    /// Stream end keyword "endstream"
    StreamEnd,
    /// Reference keyword "R" (used in "10 0 R")
    R,
}

/// True for the six PDF whitespace bytes (space, tab, CR, LF, NUL, FF).
pub fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Skip whitespace and `%`-comments before a token.
fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, ws) = take_while(is_pdf_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, ())) => remaining = rest,
            Err(_) if ws.is_empty() => break,
            Err(_) => continue,
        }
    }
    Ok((remaining, ()))
}

/// A comment runs from `%` to the end of line.
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Parse an integer or real number. PDF allows a leading sign and numbers
/// that start or end with the decimal point (.5, 5.).
fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    let digit_err = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    if int_part.is_none() && frac_part.is_none() {
        return Err(digit_err());
    }

    let negative = sign == Some('-');
    if let Some(frac) = frac_part {
        // Rebuild "i.f" and let the std float parser do the work
        let int_str = int_part
            .map(|b| std::str::from_utf8(b).unwrap_or("0"))
            .unwrap_or("0");
        let frac_str = frac
            .map(|b| std::str::from_utf8(b).unwrap_or("0"))
            .unwrap_or("0");
        let mut num: f64 = format!("{}.{}", int_str, frac_str)
            .parse()
            .map_err(|_| digit_err())?;
        if negative {
            num = -num;
        }
        Ok((rest, Token::Real(num)))
    } else {
        let int_str = std::str::from_utf8(int_part.ok_or_else(digit_err)?)
            .map_err(|_| digit_err())?;
        let mut num: i64 = int_str.parse().map_err(|_| digit_err())?;
        if negative {
            num = -num;
        }
        Ok((rest, Token::Integer(num)))
    }
}

/// Parse a literal string `(...)`, honoring nested balanced parentheses and
/// skipping over escaped characters. The raw content is returned; the
/// indexer never interprets string contents.
fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;
    while depth > 0 && pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            }
            b')' => {
                depth -= 1;
                pos += 1;
            }
            _ => pos += 1,
        }
    }
    if depth != 0 || pos > body.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    Ok((&body[pos..], Token::LiteralString(&body[..pos - 1])))
}

/// Parse a hex string `<...>`. `<<` is a dictionary start, not a hex string.
fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_pdf_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Parse a name starting with `/`, decoding `#XX` hex escapes.
fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| {
                !is_pdf_whitespace(c)
                    && !matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
            }),
            |bytes: &[u8]| Token::Name(decode_name_escapes(bytes)),
        ),
    )(input)
}

/// Decode `#XX` hex escapes in a name. Invalid escapes are kept literally,
/// matching the lenient behavior real files require.
fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let Ok(byte) = u8::from_str_radix(
                std::str::from_utf8(&raw[i + 1..i + 3]).unwrap_or(""),
                16,
            ) {
                out.push(byte as char);
                i += 3;
                continue;
            }
        }
        out.push(raw[i] as char);
        i += 1;
    }
    out
}

/// Parse keywords and delimiters. Multi-character alternatives come first so
/// `endstream` is not split into `end` + `stream` and `<<` beats `<`.
fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)
}

/// Parse one token, skipping leading whitespace and comments.
///
/// This is the entry point the dictionary parser and the recovery scanner
/// drive. The order of alternatives matters: keywords before names before
/// numbers before strings.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, ()) = skip_ws(input)?;
    alt((keyword, name, number, literal_string, hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(input: &[u8]) -> Token<'_> {
        token(input).unwrap().1
    }

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(tok(b" 42 "), Token::Integer(42));
        assert_eq!(tok(b"-17"), Token::Integer(-17));
        assert_eq!(tok(b"3.5"), Token::Real(3.5));
        assert_eq!(tok(b"-.25"), Token::Real(-0.25));
        assert_eq!(tok(b"4."), Token::Real(4.0));
    }

    #[test]
    fn test_names() {
        assert_eq!(tok(b"/Prev"), Token::Name("Prev".to_string()));
        assert_eq!(tok(b"/XRefStm 77"), Token::Name("XRefStm".to_string()));
        assert_eq!(tok(b"/A#20B"), Token::Name("A B".to_string()));
    }

    #[test]
    fn test_keywords_and_delimiters() {
        assert_eq!(tok(b"<< /Size 3 >>"), Token::DictStart);
        assert_eq!(tok(b">>"), Token::DictEnd);
        assert_eq!(tok(b"obj"), Token::ObjStart);
        assert_eq!(tok(b"endobj"), Token::ObjEnd);
        assert_eq!(tok(b"endstream"), Token::StreamEnd);
        assert_eq!(tok(b"stream\r\n"), Token::StreamStart);
        assert_eq!(tok(b"R"), Token::R);
    }

    #[test]
    fn test_strings() {
        assert_eq!(tok(b"(hello (nested))"), Token::LiteralString(b"hello (nested)"));
        assert_eq!(tok(b"(esc \\) paren)"), Token::LiteralString(b"esc \\) paren"));
        assert_eq!(tok(b"<4AFF 00>"), Token::HexString(b"4AFF 00"));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(tok(b"% header comment\n 12"), Token::Integer(12));
    }

    #[test]
    fn test_token_consumes_prefix_only() {
        let (rest, t) = token(b"17 0 R").unwrap();
        assert_eq!(t, Token::Integer(17));
        assert_eq!(rest, b" 0 R");
    }

    #[test]
    fn test_unbalanced_literal_string_fails() {
        assert!(token(b"(never closed").is_err());
    }
}
