//! A compact XPath 1.0 subset evaluated directly on `scraper` trees.
//!
//! Supported:
//! - absolute (`/`, `//`) and relative paths, unions with `|`
//! - `.`, `..`, `*`, element names, `text()`, `node()`, `@attr`, `@*`
//! - axes `child::`, `descendant::`, `descendant-or-self::`, `self::`, `parent::`, `attribute::`
//! - predicates: positions (`[2]`, `[last()]`, `[position()=2]`), `@a`, `@a='v'`, `@a!='v'`,
//!   `text()='v'`, `.='v'`, `child='v'`, `contains()`, `starts-with()`, `normalize-space()`,
//!   `not()`, `and`, `or`, parentheses
//!
//! Absolute paths are anchored at the node the expression is evaluated against, so
//! `//a` inside a container only sees that container's subtree.

use scraper::{ElementRef, Node};
use std::collections::HashSet;

use crate::selector::collapse_whitespace;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Dot,
    DotDot,
    Star,
    Pipe,
    Comma,
    Eq,
    NotEq,
    ColonColon,
    Name(String),
    Literal(String),
    Number(usize),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::ColonColon);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '[' | ']' | '(' | ')' | '@' | '*' | '|' | ',' | '=' => {
                tokens.push(match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '@' => Token::At,
                    '*' => Token::Star,
                    '|' => Token::Pipe,
                    ',' => Token::Comma,
                    _ => Token::Eq,
                });
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|p| start + p)
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                tokens.push(Token::Literal(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let number = digits
                    .parse()
                    .map_err(|_| format!("number '{}' is out of range", digits))?;
                tokens.push(Token::Number(number));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Attribute,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    AnyNode,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }

    fn yields_strings(&self) -> bool {
        self.axis == Axis::Attribute || self.test == NodeTest::Text
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attr(String),
    Text,
    Dot,
    Child(String),
    NormalizeSpace(Box<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    Exists(Operand),
    Equals(Operand, String),
    NotEquals(Operand, String),
    Contains(Operand, String),
    StartsWith(Operand, String),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    paths: Vec<LocationPath>,
}

/// What an expression selected: an element, or a string from `text()` / `@attr`
#[derive(Debug, Clone)]
pub enum XPathMatch<'a> {
    Element(ElementRef<'a>),
    Text(String),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.advance() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(format!("expected {:?}, found {:?}", expected, t)),
            None => Err(format!("expected {:?}, found end of expression", expected)),
        }
    }

    fn expect_literal(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(Token::Literal(s)) => Ok(s),
            Some(Token::Number(n)) => Ok(n.to_string()),
            Some(t) => Err(format!("expected a string literal, found {:?}", t)),
            None => Err("expected a string literal, found end of expression".to_string()),
        }
    }

    fn at_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == name)
    }

    fn function_follows(&self, name: &str) -> bool {
        self.at_name(name) && self.peek_at(1) == Some(&Token::LParen)
    }

    fn parse_expr(&mut self) -> Result<Vec<LocationPath>, String> {
        let mut paths = vec![self.parse_path()?];
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            paths.push(self.parse_path()?);
        }
        if let Some(t) = self.peek() {
            return Err(format!("unexpected {:?}", t));
        }
        Ok(paths)
    }

    fn parse_path(&mut self) -> Result<LocationPath, String> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                if matches!(self.peek(), None | Some(Token::Pipe)) {
                    return Ok(LocationPath { absolute: true, steps });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.advance();
                    steps.push(self.parse_step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }

        if let Some(pos) = steps.iter().position(Step::yields_strings) {
            if pos != steps.len() - 1 {
                return Err("text() and @attribute steps must come last".to_string());
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        let (axis, test) = match self.advance() {
            Some(Token::Dot) => (Axis::SelfAxis, NodeTest::AnyNode),
            Some(Token::DotDot) => (Axis::Parent, NodeTest::AnyNode),
            Some(Token::At) => (Axis::Attribute, self.parse_node_test()?),
            Some(Token::Name(name)) if self.peek() == Some(&Token::ColonColon) => {
                self.advance();
                let axis = match name.as_str() {
                    "child" => Axis::Child,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "self" => Axis::SelfAxis,
                    "parent" => Axis::Parent,
                    "attribute" => Axis::Attribute,
                    other => return Err(format!("unsupported axis '{}'", other)),
                };
                (axis, self.parse_node_test()?)
            }
            Some(_) => {
                self.pos -= 1;
                (Axis::Child, self.parse_node_test()?)
            }
            None => return Err("expected a location step, found end of expression".to_string()),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }

        if axis == Axis::Attribute && !predicates.is_empty() {
            return Err("predicates on attribute steps are not supported".to_string());
        }
        if test == NodeTest::Text && !predicates.iter().all(Predicate::is_positional) {
            return Err("only position predicates are supported on text() steps".to_string());
        }

        Ok(Step { axis, test, predicates })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::AnyElement),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    self.expect(Token::RParen)?;
                    match name.as_str() {
                        "text" => Ok(NodeTest::Text),
                        "node" => Ok(NodeTest::AnyNode),
                        other => Err(format!("unsupported function '{}()' in location step", other)),
                    }
                } else {
                    Ok(NodeTest::Name(name.to_ascii_lowercase()))
                }
            }
            Some(t) => Err(format!("expected a node test, found {:?}", t)),
            None => Err("expected a node test, found end of expression".to_string()),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, String> {
        let mut left = self.parse_and()?;
        while self.at_name("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, String> {
        let mut left = self.parse_unary()?;
        while self.at_name("and") {
            self.advance();
            let right = self.parse_unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate, String> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                if n == 0 {
                    return Err("positions start at 1".to_string());
                }
                return Ok(Predicate::Position(n));
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            _ => {}
        }

        if self.function_follows("not") {
            self.pos += 2;
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if self.function_follows("last") {
            self.pos += 2;
            self.expect(Token::RParen)?;
            return Ok(Predicate::Last);
        }
        if self.function_follows("position") {
            self.pos += 2;
            self.expect(Token::RParen)?;
            self.expect(Token::Eq)?;
            return match self.advance() {
                Some(Token::Number(n)) if n > 0 => Ok(Predicate::Position(n)),
                _ => Err("position() must be compared with a positive number".to_string()),
            };
        }
        for function in ["contains", "starts-with"] {
            if self.function_follows(function) {
                self.pos += 2;
                let operand = self.parse_operand()?;
                self.expect(Token::Comma)?;
                let needle = self.expect_literal()?;
                self.expect(Token::RParen)?;
                return Ok(if function == "contains" {
                    Predicate::Contains(operand, needle)
                } else {
                    Predicate::StartsWith(operand, needle)
                });
            }
        }

        let operand = self.parse_operand()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.advance();
                Ok(Predicate::Equals(operand, self.expect_literal()?))
            }
            Some(Token::NotEq) => {
                self.advance();
                Ok(Predicate::NotEquals(operand, self.expect_literal()?))
            }
            _ => Ok(Predicate::Exists(operand)),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        match self.advance() {
            Some(Token::At) => match self.advance() {
                Some(Token::Name(name)) => Ok(Operand::Attr(name.to_ascii_lowercase())),
                _ => Err("expected an attribute name after '@'".to_string()),
            },
            Some(Token::Dot) => Ok(Operand::Dot),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.advance();
                match name.as_str() {
                    "text" => {
                        self.expect(Token::RParen)?;
                        Ok(Operand::Text)
                    }
                    "normalize-space" => {
                        let inner = if self.peek() == Some(&Token::RParen) {
                            Operand::Dot
                        } else {
                            self.parse_operand()?
                        };
                        self.expect(Token::RParen)?;
                        Ok(Operand::NormalizeSpace(Box::new(inner)))
                    }
                    other => Err(format!("unsupported function '{}()'", other)),
                }
            }
            Some(Token::Name(name)) => Ok(Operand::Child(name.to_ascii_lowercase())),
            Some(t) => Err(format!("unexpected {:?} in predicate", t)),
            None => Err("unexpected end of expression in predicate".to_string()),
        }
    }
}

/// A node in the evaluation set. `Root` is the virtual parent of the context node.
#[derive(Clone, Copy)]
enum Item<'a> {
    Root(ElementRef<'a>),
    Element(ElementRef<'a>),
}

impl<'a> Item<'a> {
    fn element(&self) -> ElementRef<'a> {
        match self {
            Item::Root(e) | Item::Element(e) => *e,
        }
    }
}

fn direct_texts(element: ElementRef<'_>) -> Vec<String> {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(String::from(&**text)),
            _ => None,
        })
        .collect()
}

fn string_value(element: ElementRef<'_>) -> String {
    element.text().collect()
}

impl Operand {
    fn values(&self, element: ElementRef<'_>) -> Vec<String> {
        match self {
            Operand::Attr(name) => element.value().attr(name).map(str::to_string).into_iter().collect(),
            Operand::Text => direct_texts(element),
            Operand::Dot => vec![string_value(element)],
            Operand::Child(name) => element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == name)
                .map(string_value)
                .collect(),
            Operand::NormalizeSpace(inner) => {
                let first = inner.values(element).into_iter().next().unwrap_or_default();
                vec![collapse_whitespace(&first)]
            }
        }
    }

    /// XPath string conversion: the first node's value, or ""
    fn first_value(&self, element: ElementRef<'_>) -> String {
        self.values(element).into_iter().next().unwrap_or_default()
    }
}

impl Predicate {
    fn is_positional(&self) -> bool {
        matches!(self, Predicate::Position(_) | Predicate::Last)
    }

    fn matches_position(&self, position: usize, size: usize) -> bool {
        match self {
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
            _ => true,
        }
    }

    fn matches(&self, element: ElementRef<'_>, position: usize, size: usize) -> bool {
        match self {
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
            Predicate::Exists(operand) => !operand.values(element).is_empty(),
            Predicate::Equals(operand, literal) => {
                operand.values(element).iter().any(|v| v == literal)
            }
            Predicate::NotEquals(operand, literal) => {
                operand.values(element).iter().any(|v| v != literal)
            }
            Predicate::Contains(operand, needle) => operand.first_value(element).contains(needle.as_str()),
            Predicate::StartsWith(operand, prefix) => {
                operand.first_value(element).starts_with(prefix.as_str())
            }
            Predicate::Not(inner) => !inner.matches(element, position, size),
            Predicate::And(a, b) => {
                a.matches(element, position, size) && b.matches(element, position, size)
            }
            Predicate::Or(a, b) => a.matches(element, position, size) || b.matches(element, position, size),
        }
    }
}

fn axis_items<'a>(item: Item<'a>, axis: Axis) -> Vec<Item<'a>> {
    match (item, axis) {
        (Item::Root(ctx), Axis::Child) => vec![Item::Element(ctx)],
        (Item::Root(ctx), Axis::Descendant) => ctx.descendants().filter_map(ElementRef::wrap).map(Item::Element).collect(),
        (Item::Root(ctx), Axis::DescendantOrSelf) => std::iter::once(item)
            .chain(ctx.descendants().filter_map(ElementRef::wrap).map(Item::Element))
            .collect(),
        (Item::Root(_), Axis::SelfAxis) => vec![item],
        (Item::Root(_), _) => Vec::new(),
        (Item::Element(e), Axis::Child) => e.children().filter_map(ElementRef::wrap).map(Item::Element).collect(),
        (Item::Element(e), Axis::Descendant) => e
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(Item::Element)
            .collect(),
        (Item::Element(e), Axis::DescendantOrSelf) => e.descendants().filter_map(ElementRef::wrap).map(Item::Element).collect(),
        (Item::Element(_), Axis::SelfAxis) => vec![item],
        (Item::Element(e), Axis::Parent) => e
            .parent()
            .and_then(ElementRef::wrap)
            .map(Item::Element)
            .into_iter()
            .collect(),
        (Item::Element(_), Axis::Attribute) => Vec::new(),
    }
}

fn passes_test(item: &Item<'_>, test: &NodeTest) -> bool {
    match (item, test) {
        (_, NodeTest::AnyNode) => true,
        (Item::Root(_), _) => false,
        (Item::Element(_), NodeTest::AnyElement) => true,
        (Item::Element(e), NodeTest::Name(name)) => e.value().name().eq_ignore_ascii_case(name),
        (Item::Element(_), NodeTest::Text) => false,
    }
}

fn apply_step<'a>(input: Vec<Item<'a>>, step: &Step) -> Vec<Item<'a>> {
    let mut seen = HashSet::new();
    let mut output = Vec::new();

    for item in input {
        let mut candidates: Vec<Item<'a>> = axis_items(item, step.axis)
            .into_iter()
            .filter(|candidate| passes_test(candidate, &step.test))
            .collect();

        for predicate in &step.predicates {
            let size = candidates.len();
            candidates = candidates
                .into_iter()
                .enumerate()
                .filter(|(i, candidate)| predicate.matches(candidate.element(), i + 1, size))
                .map(|(_, candidate)| candidate)
                .collect();
        }

        for candidate in candidates {
            let key = (matches!(candidate, Item::Root(_)), candidate.element().id());
            if seen.insert(key) {
                output.push(candidate);
            }
        }
    }

    output
}

fn string_step(input: &[Item<'_>], step: &Step) -> Vec<String> {
    let mut output = Vec::new();
    for item in input {
        let element = match item {
            Item::Root(_) => continue,
            Item::Element(e) => *e,
        };
        match (&step.axis, &step.test) {
            (Axis::Attribute, NodeTest::Name(name)) => {
                if let Some(value) = element.value().attr(name) {
                    output.push(value.to_string());
                }
            }
            (Axis::Attribute, _) => {
                output.extend(element.value().attrs().map(|(_, v)| v.to_string()));
            }
            _ => {
                let candidates = match step.axis {
                    Axis::SelfAxis | Axis::Child => vec![*item],
                    other => axis_items(*item, other),
                };
                // positions count the non-blank text nodes of each context node
                let mut texts: Vec<String> = candidates
                    .iter()
                    .flat_map(|candidate| direct_texts(candidate.element()))
                    .filter(|t| !t.trim().is_empty())
                    .collect();
                for predicate in &step.predicates {
                    let size = texts.len();
                    texts = texts
                        .into_iter()
                        .enumerate()
                        .filter(|(i, _)| predicate.matches_position(i + 1, size))
                        .map(|(_, text)| text)
                        .collect();
                }
                output.extend(texts);
            }
        }
    }
    output
}

impl XPath {
    pub fn compile(expression: &str) -> Result<Self, String> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        let mut parser = Parser { tokens, pos: 0 };
        let paths = parser.parse_expr()?;
        Ok(Self { paths })
    }

    pub fn evaluate<'a>(&self, context: ElementRef<'a>) -> Vec<XPathMatch<'a>> {
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for path in &self.paths {
            let mut current = vec![if path.absolute {
                Item::Root(context)
            } else {
                Item::Element(context)
            }];

            let mut strings = None;
            for step in &path.steps {
                if step.yields_strings() {
                    strings = Some(string_step(&current, step));
                    break;
                }
                current = apply_step(current, step);
            }

            match strings {
                Some(values) => results.extend(values.into_iter().map(XPathMatch::Text)),
                None => {
                    for item in current {
                        let element = item.element();
                        if seen.insert(element.id()) {
                            results.push(XPathMatch::Element(element));
                        }
                    }
                }
            }
        }

        results
    }
}
