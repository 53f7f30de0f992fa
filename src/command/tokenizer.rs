//! Line tokenizer
//!
//! Splits a command line (invocation keyword already stripped) into tokens and
//! classifies each one as a flag, a command name or a positional argument.
//! Flags are checked before names, so a spelling that is both is a flag.
//! Quoted tokens are always arguments.

use crate::command::compiler::CommandRegistry;
use crate::core::types::Flags;
use ahash::AHashMap;
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::map;
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

/// A raw token as it appeared in the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Quote character the token was wrapped in, if any
    pub quote: Option<char>,
}

impl Token {
    fn bare(text: &str) -> Self {
        Self {
            text: text.to_string(),
            quote: None,
        }
    }

    fn quoted(text: &str, quote: char) -> Self {
        Self {
            text: text.to_string(),
            quote: Some(quote),
        }
    }

    /// Render the token back into line syntax
    pub fn to_source(&self) -> String {
        match self.quote {
            Some(q) => format!("{q}{}{q}", self.text),
            None => self.text.clone(),
        }
    }
}

/// How a token was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Flag(Flags),
    Name,
    Argument,
}

/// A flag token together with its position in the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToken {
    pub position: usize,
    pub token: String,
    pub flag: Flags,
}

/// Result of tokenizing one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub flags: Flags,
    pub flag_tokens: Vec<FlagToken>,
    /// Tokens recognized as command names, in line order
    pub consumed: Vec<String>,
    /// Positional arguments, in line order
    pub arguments: Vec<String>,
    /// Every token with its class, in line order
    pub classified: Vec<(Token, TokenClass)>,
}

impl Tokenized {
    /// The `(flags, names, arguments)` triple
    pub fn triple(&self) -> (Flags, &[String], &[String]) {
        (self.flags, &self.consumed, &self.arguments)
    }

    /// Rebuild a line from the classified tokens in their original order
    pub fn rejoin(&self) -> String {
        self.classified
            .iter()
            .map(|(token, _)| token.to_source())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quoted_with(quote: char) -> impl FnMut(&str) -> IResult<&str, Token> {
    move |input| {
        map(
            delimited(char(quote), take_while(move |c: char| c != quote), char(quote)),
            move |text: &str| Token::quoted(text, quote),
        )
        .parse(input)
    }
}

fn bare(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| !c.is_whitespace()), Token::bare).parse(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    preceded(multispace0, alt((quoted_with('"'), quoted_with('\''), bare))).parse(input)
}

/// Split a line into bare and quoted tokens, preserving order
///
/// An unterminated quote is not an error: the quote character simply stays
/// part of a bare token.
pub fn split_tokens(line: &str) -> Vec<Token> {
    many0(token)
        .parse(line)
        .map(|(_, tokens)| tokens)
        .unwrap_or_default()
}

/// Tokenize and classify a line against the flag map and registry names
///
/// `flag_map` keys must be lowercase (see
/// [`DispatchConfig::flag_map`](crate::core::DispatchConfig::flag_map)).
pub fn tokenize(
    line: &str,
    flag_map: &AHashMap<String, Flags>,
    registry: &CommandRegistry,
) -> Tokenized {
    let mut result = Tokenized::default();

    for (position, token) in split_tokens(line).into_iter().enumerate() {
        let class = if token.quote.is_some() {
            TokenClass::Argument
        } else if let Some(flag) = flag_map.get(&token.text.to_lowercase()) {
            TokenClass::Flag(*flag)
        } else if registry.is_known_name(&token.text) {
            TokenClass::Name
        } else {
            TokenClass::Argument
        };

        match class {
            TokenClass::Flag(flag) => {
                result.flags |= flag;
                result.flag_tokens.push(FlagToken {
                    position,
                    token: token.text.clone(),
                    flag,
                });
            }
            TokenClass::Name => result.consumed.push(token.text.clone()),
            TokenClass::Argument => result.arguments.push(token.text.clone()),
        }
        result.classified.push((token, class));
    }

    result
}
