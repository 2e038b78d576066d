//! Search statement parsing.
//!
//! Grammar, informally:
//!
//! ```text
//! statement := clause*                     (whitespace separated, all must hold)
//! clause    := ['-'] term
//! term      := namespace ':' value ['*']   (tag match, '*' makes it a prefix)
//!            | text                        (substring over summary, desc, tag values)
//! ```
//!
//! Double quotes group whitespace into one token (`"funny cat"`,
//! `meme:"distracted boyfriend"`). A `:` or `*` inside quotes is literal.

use crate::storage::Tag;
use crate::{Error, Result};

/// One searchable condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Substring of summary, description or any linked tag value.
    Text(String),
    /// Linked tag with this namespace and value.
    Tag(Tag),
    /// Linked tag in `namespace` whose value starts with `prefix`.
    TagPrefix { namespace: String, prefix: String },
}

/// A possibly negated term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub negated: bool,
    pub term: Term,
}

/// Parsed statement: a conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// True if the statement places no restriction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Raw token with the positions that matter for tag syntax.
struct Token {
    text: String,
    /// Byte offset of the first unquoted ':' seen before any quote.
    colon: Option<usize>,
    /// Token ends with an unquoted '*'.
    star: bool,
}

fn next_token(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token> {
    let mut token = Token {
        text: String::new(),
        colon: None,
        star: false,
    };
    let mut in_quotes = false;
    let mut seen_quote = false;

    while let Some(&c) = chars.peek() {
        if !in_quotes && c.is_whitespace() {
            break;
        }
        chars.next();
        token.star = false;
        match c {
            '"' => {
                in_quotes = !in_quotes;
                seen_quote = true;
            }
            ':' if !in_quotes && !seen_quote && token.colon.is_none() => {
                token.colon = Some(token.text.len());
                token.text.push(c);
            }
            '*' if !in_quotes => {
                token.star = true;
                token.text.push(c);
            }
            _ => token.text.push(c),
        }
    }

    if in_quotes {
        return Err(Error::validation("unterminated quote in search statement"));
    }
    Ok(token)
}

fn token_to_term(token: Token) -> Result<Option<Term>> {
    let Some(colon) = token.colon else {
        return Ok((!token.text.is_empty()).then_some(Term::Text(token.text)));
    };

    let namespace = &token.text[..colon];
    let mut value = &token.text[colon + 1..];

    if namespace.is_empty() {
        return Err(Error::validation(format!(
            "'{}' has an empty tag namespace",
            token.text
        )));
    }

    if token.star {
        value = &value[..value.len() - 1];
        let tag = Tag::new(namespace, value)?;
        return Ok(Some(Term::TagPrefix {
            namespace: tag.namespace,
            prefix: tag.value,
        }));
    }

    Ok(Some(Term::Tag(Tag::new(namespace, value)?)))
}

/// Parse a search statement.
///
/// # Errors
///
/// Returns a validation error for an unterminated quote, an empty tag
/// namespace or value, or a `-` with nothing after it.
pub fn parse(statement: &str) -> Result<Query> {
    let mut clauses = Vec::new();
    let mut chars = statement.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        let negated = first == '-';
        if negated {
            chars.next();
            if chars.peek().map_or(true, |c| c.is_whitespace()) {
                return Err(Error::validation("'-' must be followed by a search term"));
            }
        }

        match token_to_term(next_token(&mut chars)?)? {
            Some(term) => clauses.push(Clause { negated, term }),
            None if negated => {
                return Err(Error::validation("'-' must be followed by a search term"));
            }
            None => {}
        }
    }

    Ok(Query { clauses })
}
