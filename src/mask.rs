//! Amber-style atom mask expressions.
//!
//! - `*`            all atoms
//! - `@CA,C,N`      atoms by name
//! - `@1-10,12`     atoms by (one-based) number
//! - `:ALA,GLY`     residues by name
//! - `:1-13`        residues by (one-based, sequential) number
//! - `:1-13@CA`     atoms named CA in residues 1 through 13
//!
//! Names may contain the wildcards `*` (any run of characters) and `?` (any single character).
//! Expressions combine with `!` (not), `&` (and) and `|` (or), in that order of precedence, and
//! can be grouped with parentheses.
//!
//! Examples:
//! - `:1-10&!@H*`
//! - `(:WAT|:Na+)&@O,Na+`

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::Topology;

/// A single entry in a comma separated list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Number(usize),
    /// Inclusive on both ends.
    Range(usize, usize),
    Name(String),
}

impl Item {
    fn matches(&self, number: usize, name: &str) -> bool {
        match self {
            Item::Number(n) => number == *n,
            Item::Range(first, last) => (*first..=*last).contains(&number),
            Item::Name(pattern) => glob(pattern, name),
        }
    }
}

/// A parsed mask expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskExpr {
    All,
    Atoms(Vec<Item>),
    Residues(Vec<Item>),
    Not(Box<MaskExpr>),
    And(Box<MaskExpr>, Box<MaskExpr>),
    Or(Box<MaskExpr>, Box<MaskExpr>),
}

impl MaskExpr {
    /// Evaluate this expression for every atom in `topology`.
    pub fn evaluate(&self, topology: &Topology) -> Vec<bool> {
        let atoms = topology.atoms();
        match self {
            MaskExpr::All => vec![true; atoms.len()],
            MaskExpr::Atoms(items) => atoms
                .iter()
                .enumerate()
                .map(|(idx, atom)| items.iter().any(|item| item.matches(idx + 1, &atom.name)))
                .collect(),
            MaskExpr::Residues(items) => atoms
                .iter()
                .map(|atom| {
                    items
                        .iter()
                        .any(|item| item.matches(atom.resid + 1, &atom.resname))
                })
                .collect(),
            MaskExpr::Not(inner) => inner.evaluate(topology).into_iter().map(|b| !b).collect(),
            MaskExpr::And(l, r) => {
                combine(l.evaluate(topology), r.evaluate(topology), |a, b| a && b)
            }
            MaskExpr::Or(l, r) => {
                combine(l.evaluate(topology), r.evaluate(topology), |a, b| a || b)
            }
        }
    }
}

fn combine(left: Vec<bool>, right: Vec<bool>, op: impl Fn(bool, bool) -> bool) -> Vec<bool> {
    left.into_iter().zip(right).map(|(a, b)| op(a, b)).collect()
}

impl FromStr for MaskExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser {
            input: s.chars().collect(),
            pos: 0,
        };
        let expr = parser.parse_or()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(parser.error(format!("unexpected '{c}'")));
        }
        Ok(expr)
    }
}

/// Match `name` against a `pattern` with `*` and `?` wildcards.
fn glob(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    // Where to resume after the last `*`, if a later match fails.
    let mut backtrack = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

const DELIMITERS: &[char] = &[',', '&', '|', '!', '(', ')', '@', ':'];

struct Parser {
    input: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error(&self, message: impl AsRef<str>) -> Error {
        let expr: String = self.input.iter().collect();
        Error::Selection(format!(
            "invalid mask '{expr}' at position {}: {}",
            self.pos,
            message.as_ref()
        ))
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Consume `c` if it is the next non-whitespace character.
    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<MaskExpr> {
        let mut left = self.parse_and()?;
        while self.eat('|') {
            let right = self.parse_and()?;
            left = MaskExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<MaskExpr> {
        let mut left = self.parse_not()?;
        while self.eat('&') {
            let right = self.parse_not()?;
            left = MaskExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<MaskExpr> {
        if self.eat('!') {
            let inner = self.parse_not()?;
            Ok(MaskExpr::Not(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<MaskExpr> {
        if self.eat('(') {
            let inner = self.parse_or()?;
            if !self.eat(')') {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }
        if self.eat('*') {
            return Ok(MaskExpr::All);
        }
        if self.eat(':') {
            let residues = MaskExpr::Residues(self.parse_list()?);
            // A residue list directly followed by an atom list selects their intersection.
            if self.peek() == Some('@') {
                self.pos += 1;
                let atoms = MaskExpr::Atoms(self.parse_list()?);
                return Ok(MaskExpr::And(Box::new(residues), Box::new(atoms)));
            }
            return Ok(residues);
        }
        if self.eat('@') {
            return Ok(MaskExpr::Atoms(self.parse_list()?));
        }
        match self.peek() {
            Some(c) => Err(self.error(format!("expected a selector, found '{c}'"))),
            None => Err(self.error("unexpected end of mask")),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Item>> {
        let mut items = vec![self.parse_item()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            items.push(self.parse_item()?);
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Item> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !DELIMITERS.contains(&c))
        {
            self.pos += 1;
        }
        let token: String = self.input[start..self.pos].iter().collect();
        if token.is_empty() {
            return Err(self.error("expected a name or number"));
        }

        let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        let number = |s: &str| {
            s.parse::<usize>()
                .map_err(|err| self.error(format!("bad number '{s}': {err}")))
        };
        if is_number(&token) {
            return Ok(Item::Number(number(&token)?));
        }
        if let Some((first, last)) = token.split_once('-') {
            if is_number(first) && is_number(last) {
                let (first, last) = (number(first)?, number(last)?);
                if first > last {
                    return Err(self.error(format!("empty range {first}-{last}")));
                }
                return Ok(Item::Range(first, last));
            }
        }
        Ok(Item::Name(token))
    }
}
