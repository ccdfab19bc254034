//! Brace token scanner shared by URL validation, URL resolution, template
//! compilation and template auditing.
//!
//! Grammar:
//! - `{name}` is a token when `name` is non-empty and contains no `{`, `}` or whitespace
//! - `{` without a closing `}` is literal text
//! - `{a{b}}` yields literal `{a`, token `b`, literal `}` (innermost brace wins)
//! - `\{name}` is literal; the backslash stays in the output
//! - `\\{name}` is a token: only an odd run of backslashes escapes the brace
//! - stray `}` is literal
//!
//! Literal segments are always copied verbatim, so rendering a string with no
//! tokens returns it unchanged.

use std::borrow::Cow;

/// Whole-match token usable in tool URLs
pub const SEARCH_TERM_TOKEN: &str = "searchTerm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Token name without braces
    Token(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized<'a> {
    pub segments: Vec<Segment<'a>>,
    /// Byte offsets of `{` that open no token (escaped braces excluded)
    pub malformed: Vec<usize>,
}

/// Split `input` into literal and token segments
pub fn tokenize(input: &str) -> Tokenized<'_> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut malformed = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        if is_escaped(bytes, i) {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        match token_end(&input[name_start..]) {
            Some(len) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&input[literal_start..i]));
                }
                segments.push(Segment::Token(&input[name_start..name_start + len]));
                i = name_start + len + 1;
                literal_start = i;
            }
            None => {
                malformed.push(i);
                i += 1;
            }
        }
    }

    if literal_start < input.len() {
        segments.push(Segment::Literal(&input[literal_start..]));
    }

    Tokenized { segments, malformed }
}

fn is_escaped(bytes: &[u8], brace: usize) -> bool {
    let run = bytes[..brace].iter().rev().take_while(|&&b| b == b'\\').count();
    run % 2 == 1
}

/// Length of the token name at the start of `rest`, if a closing brace ends it
fn token_end(rest: &str) -> Option<usize> {
    for (offset, ch) in rest.char_indices() {
        match ch {
            '}' if offset > 0 => return Some(offset),
            '}' | '{' => return None,
            c if c.is_whitespace() => return None,
            _ => {}
        }
    }
    None
}

impl<'a> Tokenized<'a> {
    /// Distinct token names in first-occurrence order
    pub fn token_names(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Token(name) = segment {
                if !names.contains(name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Render with `resolve`; tokens it returns `None` for are kept verbatim.
    /// Resolved values are inserted as-is and never re-scanned.
    pub fn render<'v, F>(&self, mut resolve: F) -> String
    where
        F: FnMut(&'a str) -> Option<Cow<'v, str>>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match *segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => match resolve(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }

    /// Render with a fallible `resolve`; the first error aborts rendering
    pub fn try_render<'v, F, E>(&self, mut resolve: F) -> Result<String, E>
    where
        F: FnMut(&'a str) -> Result<Cow<'v, str>, E>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match *segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => out.push_str(&resolve(name)?),
            }
        }
        Ok(out)
    }
}

/// Positional clip reference: `c<N>` with N a positive decimal integer.
///
/// Returns the 1-based index. Indices too large for `u64` come back as
/// `u64::MAX` so they fall out of range instead of being treated as names.
pub fn clip_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix('c')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u64>() {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(_) => Some(u64::MAX),
    }
}
