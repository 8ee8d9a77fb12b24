//! The subset of IQL the mock understands: `and`-joined clauses over the
//! object type, the object id and plain attribute equality.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `objectType="Name"`
    TypeIs(String),
    /// `objectType in objectTypeAndChildren("Name")`
    TypeAndChildren(String),
    /// `objectId=7`
    IdIs(i64),
    /// `objectId in (1,2,3)`
    IdIn(Vec<i64>),
    /// `Attribute="value"`; for references the value is the target label.
    AttributeIs { attribute: String, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IqlError {
    #[error("unexpected end of query")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    Unexpected(String),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Text(String),
    Symbol(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => word.clone(),
            Token::Text(text) => format!("\"{text}\""),
            Token::Symbol(symbol) => symbol.to_string(),
        }
    }
}

pub fn parse(input: &str) -> Result<Vec<Clause>, IqlError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, position: 0 };
    let mut clauses = vec![parser.clause()?];
    while let Some(token) = parser.next() {
        match token {
            Token::Word(word) if word.eq_ignore_ascii_case("and") => clauses.push(parser.clause()?),
            other => return Err(IqlError::Unexpected(other.describe())),
        }
    }
    Ok(clauses)
}

fn tokenize(input: &str) -> Result<Vec<Token>, IqlError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' | '(' | ')' | ',' => {
                tokens.push(Token::Symbol(c));
                chars.next();
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err(IqlError::UnterminatedString),
                        },
                        Some('"') => break,
                        Some(other) => text.push(other),
                        None => return Err(IqlError::UnterminatedString),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(IqlError::Unexpected(other.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect_next(&mut self) -> Result<Token, IqlError> {
        self.next().ok_or(IqlError::UnexpectedEnd)
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), IqlError> {
        match self.expect_next()? {
            Token::Symbol(found) if found == symbol => Ok(()),
            other => Err(IqlError::Unexpected(other.describe())),
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), IqlError> {
        match self.expect_next()? {
            Token::Word(found) if found.eq_ignore_ascii_case(word) => Ok(()),
            other => Err(IqlError::Unexpected(other.describe())),
        }
    }

    fn value(&mut self) -> Result<String, IqlError> {
        match self.expect_next()? {
            Token::Text(text) | Token::Word(text) => Ok(text),
            other => Err(IqlError::Unexpected(other.describe())),
        }
    }

    fn number(&mut self) -> Result<i64, IqlError> {
        let value = self.value()?;
        value.parse().map_err(|_| IqlError::InvalidNumber(value))
    }

    fn clause(&mut self) -> Result<Clause, IqlError> {
        let subject = match self.expect_next()? {
            Token::Word(word) => word,
            other => return Err(IqlError::Unexpected(other.describe())),
        };
        let operator = self.expect_next()?;
        let is_in = matches!(&operator, Token::Word(word) if word.eq_ignore_ascii_case("in"));
        if !is_in && operator != Token::Symbol('=') {
            return Err(IqlError::Unexpected(operator.describe()));
        }

        match (subject.to_ascii_lowercase().as_str(), is_in) {
            ("objecttype", false) => Ok(Clause::TypeIs(self.value()?)),
            ("objecttype", true) => {
                self.expect_word("objectTypeAndChildren")?;
                self.expect_symbol('(')?;
                let name = self.value()?;
                self.expect_symbol(')')?;
                Ok(Clause::TypeAndChildren(name))
            }
            ("objectid", false) => Ok(Clause::IdIs(self.number()?)),
            ("objectid", true) => {
                self.expect_symbol('(')?;
                let mut ids = vec![self.number()?];
                loop {
                    match self.expect_next()? {
                        Token::Symbol(',') => ids.push(self.number()?),
                        Token::Symbol(')') => break,
                        other => return Err(IqlError::Unexpected(other.describe())),
                    }
                }
                Ok(Clause::IdIn(ids))
            }
            (_, false) => Ok(Clause::AttributeIs {
                attribute: subject,
                value: self.value()?,
            }),
            (_, true) => Err(IqlError::Unexpected("in".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_with_children_and_id_set() {
        let clauses = parse("objectType in objectTypeAndChildren(\"Company\") and objectId in (1,2, 3)").unwrap();
        assert_eq!(
            clauses,
            vec![
                Clause::TypeAndChildren("Company".to_string()),
                Clause::IdIn(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn exact_type_and_escaped_name() {
        let clauses = parse(r#"objectType="Country" AND Name="Foo \"Bar\"""#).unwrap();
        assert_eq!(
            clauses,
            vec![
                Clause::TypeIs("Country".to_string()),
                Clause::AttributeIs {
                    attribute: "Name".to_string(),
                    value: "Foo \"Bar\"".to_string(),
                },
            ]
        );
    }

    #[test]
    fn bare_values_are_accepted() {
        assert_eq!(parse("objectId=42").unwrap(), vec![Clause::IdIs(42)]);
        assert_eq!(
            parse("ShortName=DE").unwrap(),
            vec![Clause::AttributeIs {
                attribute: "ShortName".to_string(),
                value: "DE".to_string(),
            }]
        );
    }

    #[test]
    fn malformed_queries_are_rejected() {
        assert_eq!(parse(""), Err(IqlError::UnexpectedEnd));
        assert_eq!(parse("Name=\"open"), Err(IqlError::UnterminatedString));
        assert_eq!(parse("objectId=abc"), Err(IqlError::InvalidNumber("abc".to_string())));
        assert_eq!(parse("Name=\"a\" or Name=\"b\""), Err(IqlError::Unexpected("or".to_string())));
        assert!(parse("objectId in (1 2)").is_err());
    }
}
