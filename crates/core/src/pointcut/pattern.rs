use super::PointcutError;
use crate::universe::TypeUniverse;
use regex::Regex;
use smol_str::SmolStr;

/// A name with `*` and `..` wildcards.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    raw: String,
    regex: Option<Regex>,
}

impl NameMatcher {
    /// Type or member name: `*` stays within one segment, `..` spans packages.
    pub fn type_name(raw: &str, position: usize) -> Result<Self, PointcutError> {
        Self::compile(raw, position, "[^.]*")
    }

    /// Bean names may contain dots, so `*` spans any characters.
    pub fn bean_name(raw: &str, position: usize) -> Result<Self, PointcutError> {
        Self::compile(raw, position, ".*")
    }

    fn compile(raw: &str, position: usize, star: &str) -> Result<Self, PointcutError> {
        if !raw.contains('*') && !raw.contains("..") {
            return Ok(Self {
                raw: raw.to_string(),
                regex: None,
            });
        }
        let mut re = String::from("^");
        let mut rest = raw;
        while !rest.is_empty() {
            if let Some(r) = rest.strip_prefix("..") {
                re.push_str(r"\.(?:.*\.)?");
                rest = r;
            } else if let Some(r) = rest.strip_prefix('*') {
                re.push_str(star);
                rest = r;
            } else {
                let c = rest.chars().next().unwrap_or_default();
                re.push_str(&regex::escape(&c.to_string()));
                rest = &rest[c.len_utf8()..];
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| {
            PointcutError::new(format!("invalid name pattern '{}': {}", raw, e), position)
        })?;
        Ok(Self {
            raw: raw.to_string(),
            regex: Some(regex),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(name),
            None => self.raw == name,
        }
    }
}

/// A type pattern: `*`, `com.acme..*Service+`, `String[]`, `!Foo`, `(A || B)`.
#[derive(Debug, Clone)]
pub enum TypePattern {
    Any,
    Name {
        matcher: NameMatcher,
        subtypes: bool,
        dims: usize,
    },
    Not(Box<TypePattern>),
    And(Box<TypePattern>, Box<TypePattern>),
    Or(Box<TypePattern>, Box<TypePattern>),
}

impl TypePattern {
    pub fn parse(text: &str, position: usize) -> Result<Self, PointcutError> {
        let mut parser = TypePatternParser {
            src: text,
            pos: 0,
            base: position,
        };
        let pattern = parser.or()?;
        parser.skip_ws();
        if parser.pos < text.len() {
            return Err(PointcutError::new(
                format!("unexpected '{}' in type pattern", &text[parser.pos..]),
                position + parser.pos,
            ));
        }
        Ok(pattern)
    }

    /// A pattern for exactly the named type.
    pub fn exact(fqn: &str) -> Self {
        let dims = fqn.matches("[]").count();
        TypePattern::Name {
            matcher: NameMatcher {
                raw: fqn.trim_end_matches("[]").to_string(),
                regex: None,
            },
            subtypes: false,
            dims,
        }
    }

    /// Plain identifier (`x`, `audited`) that may name a bound advice parameter.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            TypePattern::Name {
                matcher,
                subtypes: false,
                dims: 0,
            } if matcher.regex.is_none()
                && !matcher.raw.contains('.')
                && matcher.raw.chars().next().is_some_and(|c| c.is_lowercase())
                && !weavescope_java::naming::PRIMITIVES.contains(&matcher.raw.as_str()) =>
            {
                Some(&matcher.raw)
            }
            _ => None,
        }
    }

    pub fn matches(&self, type_name: &str, universe: &TypeUniverse) -> bool {
        match self {
            TypePattern::Any => true,
            TypePattern::Not(inner) => !inner.matches(type_name, universe),
            TypePattern::And(a, b) => {
                a.matches(type_name, universe) && b.matches(type_name, universe)
            }
            TypePattern::Or(a, b) => {
                a.matches(type_name, universe) || b.matches(type_name, universe)
            }
            TypePattern::Name {
                matcher,
                subtypes,
                dims,
            } => {
                let actual_dims = type_name.matches("[]").count();
                if actual_dims != *dims {
                    return false;
                }
                let base = type_name.trim_end_matches("[]");
                if name_matches(matcher, base) {
                    return true;
                }
                *subtypes
                    && universe
                        .supertypes(base)
                        .iter()
                        .any(|s| name_matches(matcher, s))
            }
        }
    }

    /// True when `type_name` or any of its supertypes matches, i.e. a value of
    /// `type_name` is an instance of the pattern.
    pub fn matches_assignable(&self, type_name: &str, universe: &TypeUniverse) -> bool {
        if self.matches(type_name, universe) {
            return true;
        }
        if type_name.ends_with("[]") {
            return false;
        }
        universe
            .supertypes(type_name)
            .iter()
            .any(|s| self.matches(s, universe))
    }
}

/// Dot-free patterns (`Service`, `*Service`) are matched against simple names.
fn name_matches(matcher: &NameMatcher, fqn: &str) -> bool {
    if matcher.is_match(fqn) {
        return true;
    }
    if matcher.raw.contains('.') {
        return false;
    }
    fqn.rsplit_once('.')
        .is_some_and(|(_, simple)| matcher.is_match(simple))
}

struct TypePatternParser<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl TypePatternParser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<TypePattern, PointcutError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = TypePattern::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<TypePattern, PointcutError> {
        let mut left = self.unary()?;
        while self.eat("&&") {
            let right = self.unary()?;
            left = TypePattern::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<TypePattern, PointcutError> {
        if self.eat("!") {
            return Ok(TypePattern::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            if !self.eat(")") {
                let position = self.base + self.pos;
                return Err(PointcutError::new("expected ')' in type pattern", position));
            }
            return Ok(inner);
        }
        self.name()
    }

    fn name(&mut self) -> Result<TypePattern, PointcutError> {
        self.skip_ws();
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '*')))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(PointcutError::new(
                "expected a type pattern",
                self.base + start,
            ));
        }
        let raw = &self.src[start..start + len];
        self.pos += len;
        self.skip_type_arguments()?;
        let subtypes = self.eat("+");
        let mut dims = 0;
        while self.eat("[]") {
            dims += 1;
        }
        if self.eat("...") {
            dims += 1;
        }
        if raw == "*" && !subtypes && dims == 0 {
            return Ok(TypePattern::Any);
        }
        Ok(TypePattern::Name {
            matcher: NameMatcher::type_name(raw, self.base + start)?,
            subtypes,
            dims,
        })
    }

    /// Generic arguments are erased: `List<String>` matches like `List`.
    fn skip_type_arguments(&mut self) -> Result<(), PointcutError> {
        if !self.rest().starts_with('<') {
            return Ok(());
        }
        let mut depth = 0usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += i + 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(PointcutError::new("unbalanced '<' in type pattern", self.base + self.pos))
    }
}

/// One entry of a parameter list pattern.
#[derive(Debug, Clone)]
pub enum ArgPattern {
    /// `..`
    AnySequence,
    /// `*`
    Any,
    Type(TypePattern),
    /// A bound advice parameter; `None` when its type is unknown.
    Bound(Option<SmolStr>),
}

impl ArgPattern {
    pub fn parse_list(text: &str, position: usize) -> Result<Vec<ArgPattern>, PointcutError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut offset = position + (text.len() - text.trim_start().len());
        for part in split_top_level(trimmed, ',') {
            let item = part.trim();
            out.push(match item {
                ".." => ArgPattern::AnySequence,
                "*" => ArgPattern::Any,
                "" => return Err(PointcutError::new("empty parameter pattern", offset)),
                other => ArgPattern::Type(TypePattern::parse(other, offset)?),
            });
            offset += part.len() + 1;
        }
        Ok(out)
    }
}

/// Matches `patterns` against `values`, letting `..` absorb any run of values.
pub fn match_sequence<T>(
    patterns: &[ArgPattern],
    values: &[T],
    matches_one: &dyn Fn(&ArgPattern, &T) -> bool,
) -> bool {
    match patterns.split_first() {
        None => values.is_empty(),
        Some((ArgPattern::AnySequence, rest)) => {
            (0..=values.len()).any(|skip| match_sequence(rest, &values[skip..], matches_one))
        }
        Some((first, rest)) => match values.split_first() {
            Some((value, remaining)) => {
                matches_one(first, value) && match_sequence(rest, remaining, matches_one)
            }
            None => false,
        },
    }
}

/// Splits on `sep` outside of `()` and `<>`.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' => depth += 1,
            ')' | '>' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
