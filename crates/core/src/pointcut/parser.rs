//! Recursive-descent parser for pointcut expressions.
//!
//! Designator arguments are captured as balanced raw text first and parsed
//! per designator afterwards, so each designator owns its argument grammar.

use super::PointcutError;
use super::ast::{MethodPattern, ModifierPattern, PointcutExpr, TypeArg};
use super::pattern::{ArgPattern, NameMatcher, TypePattern, split_top_level};
use smol_str::SmolStr;

const UNSUPPORTED: &[&str] = &[
    "call",
    "get",
    "set",
    "initialization",
    "preinitialization",
    "staticinitialization",
    "handler",
    "adviceexecution",
    "withincode",
    "cflow",
    "cflowbelow",
    "if",
    "@withincode",
];

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "synchronized",
    "abstract",
    "native",
    "strictfp",
    "default",
];

pub fn parse(expression: &str) -> Result<PointcutExpr, PointcutError> {
    let mut parser = Parser { src: expression, pos: 0 };
    parser.skip_ws();
    if parser.at_end() {
        return Err(PointcutError::new("empty pointcut expression", 0));
    }
    let expr = parser.or()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(PointcutError::new(
            format!("unexpected '{}'", parser.rest()),
            parser.pos,
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '@' | '*')
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
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

    /// Word operators (`and`, `or`, `not`) must not be a prefix of an identifier.
    fn eat_word(&mut self, word: &str) -> bool {
        self.skip_ws();
        let Some(after) = self.rest().strip_prefix(word) else {
            return false;
        };
        if after.chars().next().is_none_or(|c| !is_ident_char(c)) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<PointcutExpr, PointcutError> {
        let mut left = self.and()?;
        while self.eat("||") || self.eat_word("or") {
            let right = self.and()?;
            left = PointcutExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<PointcutExpr, PointcutError> {
        let mut left = self.unary()?;
        while self.eat("&&") || self.eat_word("and") {
            let right = self.unary()?;
            left = PointcutExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<PointcutExpr, PointcutError> {
        if self.eat("!") || self.eat_word("not") {
            return Ok(PointcutExpr::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            if !self.eat(")") {
                return Err(PointcutError::new("unbalanced parentheses", self.pos));
            }
            return Ok(inner);
        }
        self.primitive()
    }

    fn primitive(&mut self) -> Result<PointcutExpr, PointcutError> {
        self.skip_ws();
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(match self.rest().chars().next() {
                Some(c) => PointcutError::new(format!("unexpected '{}'", c), start),
                None => PointcutError::new("unexpected end of expression", start),
            });
        }
        let name = &self.src[start..start + len];
        self.pos += len;
        if !self.eat("(") {
            return Err(PointcutError::new(
                format!("expected '(' after '{}'", name),
                self.pos,
            ));
        }
        let args_start = self.pos;
        let args = self.balanced()?;
        primitive(name, args, start, args_start)
    }

    /// Consumes up to the `)` closing an already opened `(`.
    fn balanced(&mut self) -> Result<&'a str, PointcutError> {
        let start = self.pos;
        let mut depth = 1usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let args = &self.src[start..start + i];
                        self.pos = start + i + 1;
                        return Ok(args);
                    }
                }
                _ => {}
            }
        }
        Err(PointcutError::new("unbalanced parentheses", start))
    }
}

fn primitive(
    name: &str,
    args: &str,
    start: usize,
    args_start: usize,
) -> Result<PointcutExpr, PointcutError> {
    let single_type = || TypePattern::parse(args.trim(), args_start).map(TypeArg::Type);
    Ok(match name {
        "execution" => PointcutExpr::Execution(method_pattern(args, args_start)?),
        "within" => PointcutExpr::Within(TypePattern::parse(args.trim(), args_start)?),
        "this" => PointcutExpr::This(single_type()?),
        "target" => PointcutExpr::Target(single_type()?),
        "args" => PointcutExpr::Args(ArgPattern::parse_list(args, args_start)?),
        "bean" => PointcutExpr::Bean(NameMatcher::bean_name(args.trim(), args_start)?),
        "@annotation" => PointcutExpr::AtAnnotation(single_type()?),
        "@within" => PointcutExpr::AtWithin(single_type()?),
        "@target" => PointcutExpr::AtTarget(single_type()?),
        "@args" => PointcutExpr::AtArgs(ArgPattern::parse_list(args, args_start)?),
        n if UNSUPPORTED.contains(&n) => {
            return Err(PointcutError::new(
                format!("unsupported pointcut primitive '{}'", n),
                start,
            ));
        }
        n if n.starts_with('@') || n.contains('*') => {
            return Err(PointcutError::new(
                format!("unknown pointcut primitive '{}'", n),
                start,
            ));
        }
        n => {
            let (owner, simple) = match n.rsplit_once('.') {
                Some((owner, simple)) => (Some(SmolStr::new(owner)), simple),
                None => (None, n),
            };
            let args = if args.trim().is_empty() {
                Vec::new()
            } else {
                split_top_level(args, ',')
                    .into_iter()
                    .map(|a| SmolStr::new(a.trim()))
                    .collect()
            };
            PointcutExpr::Reference {
                owner,
                name: SmolStr::new(simple),
                args,
                position: start,
            }
        }
    })
}

/// `[modifiers] ret [declaring.]name(params) [throws ...]`
fn method_pattern(text: &str, position: usize) -> Result<MethodPattern, PointcutError> {
    let open = find_parameter_list(text).ok_or_else(|| {
        PointcutError::new("expected a parameter list in execution pattern", position)
    })?;
    let close = matching_paren(text, open)
        .ok_or_else(|| PointcutError::new("unbalanced parentheses", position + open))?;
    let trailing = text[close + 1..].trim();
    if !trailing.is_empty() && !trailing.starts_with("throws") {
        return Err(PointcutError::new(
            format!("unexpected '{}' in execution pattern", trailing),
            position + close + 1,
        ));
    }

    let params = ArgPattern::parse_list(&text[open + 1..close], position + open + 1)?;
    let head = &text[..open];
    let words = split_words(head);
    let Some((qualified, rest)) = words.split_last() else {
        return Err(PointcutError::new("expected a method name pattern", position));
    };

    let mut modifiers = Vec::new();
    let mut index = 0;
    while let Some(word) = rest.get(index) {
        let (negated, modifier) = match word.strip_prefix('!') {
            Some(m) => (true, m),
            None => (false, *word),
        };
        if !MODIFIERS.contains(&modifier) {
            break;
        }
        modifiers.push(ModifierPattern {
            negated,
            modifier: SmolStr::new(modifier),
        });
        index += 1;
    }
    let return_text = rest[index..].join(" ");
    if return_text.is_empty() {
        return Err(PointcutError::new("missing return type pattern", position));
    }
    let return_type = TypePattern::parse(&return_text, position)?;

    let name_offset = position + head.rfind(qualified).unwrap_or(0);
    let (declaring_type, name) = match qualified.rfind('.') {
        Some(dot) => {
            let mut declaring = qualified[..dot].to_string();
            // `com.acme..find*(..)` means any type under `com.acme`.
            if declaring.ends_with('.') {
                declaring.push('*');
            }
            (
                Some(TypePattern::parse(&declaring, name_offset)?),
                &qualified[dot + 1..],
            )
        }
        None => (None, *qualified),
    };
    if name.is_empty() {
        return Err(PointcutError::new("expected a method name pattern", name_offset));
    }

    Ok(MethodPattern {
        modifiers,
        return_type,
        declaring_type,
        name: NameMatcher::type_name(name, name_offset)?,
        params,
    })
}

/// The `(` that opens the parameter list: the first one directly after a
/// name pattern, so a parenthesized return type is skipped.
fn find_parameter_list(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut previous: Option<char> = None;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            '(' if depth == 0
                && previous
                    .is_some_and(|p| p.is_alphanumeric() || matches!(p, '*' | '_' | '$')) =>
            {
                return Some(i);
            }
            _ => {}
        }
        if !c.is_whitespace() {
            previous = Some(c);
        }
    }
    None
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whitespace-separated words, keeping `Map<K, V>` and `(A || B)` together.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            _ => {}
        }
        if c.is_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                words.push(&text[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_structure() {
        let expr = parse("execution(* *(..)) && !within(com.acme..*) || bean(*Service)").unwrap();
        match expr {
            PointcutExpr::Or(left, right) => {
                assert!(matches!(*left, PointcutExpr::And(_, _)));
                assert!(matches!(*right, PointcutExpr::Bean(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse("within(a.B) and not bean(x)").unwrap(),
            PointcutExpr::And(_, _)
        ));
    }

    #[test]
    fn execution_pattern_parts() {
        let expression = "execution(public !static java.util.List<String> \
                          com.acme..*Service.find*(Long, ..) throws Exception)";
        let PointcutExpr::Execution(m) = parse(expression).unwrap() else {
            panic!("expected execution");
        };
        assert_eq!(m.modifiers.len(), 2);
        assert!(m.modifiers[1].negated);
        assert!(m.name.is_match("findAll"));
        assert_eq!(m.params.len(), 2);
        assert!(m.declaring_type.is_some());

        let PointcutExpr::Execution(m) = parse("execution(* com.acme..find(..))").unwrap() else {
            panic!("expected execution");
        };
        assert_eq!(m.name.raw(), "find");
    }

    #[test]
    fn references_and_errors() {
        match parse("com.acme.Pointcuts.service() && audited(a)").unwrap() {
            PointcutExpr::And(left, right) => {
                assert!(matches!(
                    *left,
                    PointcutExpr::Reference { ref owner, .. }
                        if owner.as_deref() == Some("com.acme.Pointcuts")
                ));
                assert!(matches!(
                    *right,
                    PointcutExpr::Reference { ref args, .. } if args.len() == 1
                ));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = parse("execution(* foo(").unwrap_err();
        assert!(err.message.contains("unbalanced"));
        let err = parse("call(* *(..))").unwrap_err();
        assert_eq!(err.message, "unsupported pointcut primitive 'call'");
        assert!(parse("").is_err());
        assert!(parse("execution(foo())").is_err());
    }
}
