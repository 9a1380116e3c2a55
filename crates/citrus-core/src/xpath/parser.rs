use crate::error::{Error, Result};

/// Axis a location step walks along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
    SelfNode,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "self" => Self::SelfNode,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            _ => return None,
        })
    }

    /// Reverse axes number their nodes from the context node backwards.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::PrecedingSibling | Self::Preceding
        )
    }
}

/// Namespace part of a name test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceTest {
    /// Unprefixed name, matches in any namespace.
    Any,
    /// `prefix:name`, resolved through the namespace context.
    Prefix(String),
    /// `{uri}name`.
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Principal node with an optional local name; `None` is `*`.
    Name {
        namespace: NamespaceTest,
        local: Option<String>,
    },
    Text,
    Comment,
    ProcessingInstruction,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Parsed XPath expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOperator, Box<Expr>, Box<Expr>),
    Arithmetic(ArithmeticOperator, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    /// Location path, from the document root when `absolute`.
    Path { absolute: bool, steps: Vec<Step> },
    /// Primary expression with predicates and trailing steps.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    DoubleDot,
    At,
    Comma,
    Pipe,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Plus,
    Minus,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Literal(String),
    Number(f64),
    NameTest(NodeTest),
    FunctionName(String),
    NodeType(String),
    AxisName(Axis),
}

/// Parses `expression` into an expression tree.
pub fn parse(expression: &str) -> Result<Expr> {
    let tokens = Lexer::new(expression).tokenize()?;
    let mut parser = Parser {
        expression,
        tokens,
        position: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(&format!("unexpected token {token:?}")));
    }
    Ok(expr)
}

fn syntax_error(expression: &str, reason: &str) -> Error {
    Error::InvalidExpression(format!("Invalid XPath expression '{expression}': {reason}"))
}

fn is_name_start(character: char) -> bool {
    character.is_alphabetic() || character == '_'
}

fn is_name_char(character: char) -> bool {
    character.is_alphanumeric() || matches!(character, '_' | '-' | '.')
}

struct Lexer<'expr> {
    expression: &'expr str,
    chars: Vec<char>,
    position: usize,
    tokens: Vec<Token>,
}

impl<'expr> Lexer<'expr> {
    fn new(expression: &'expr str) -> Self {
        Self {
            expression,
            chars: expression.chars().collect(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn error(&self, reason: &str) -> Error {
        syntax_error(self.expression, reason)
    }

    /// Whether the previous token forces `*` and names to be read as operators.
    fn expects_operator(&self) -> bool {
        matches!(
            self.tokens.last(),
            Some(
                Token::RightParen
                    | Token::RightBracket
                    | Token::Dot
                    | Token::DoubleDot
                    | Token::Literal(_)
                    | Token::Number(_)
                    | Token::NameTest(_)
            )
        )
    }

    fn skip_whitespace(&mut self) {
        while self.peek_at(0).is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        loop {
            self.skip_whitespace();
            let Some(current) = self.peek_at(0) else {
                return Ok(self.tokens);
            };
            let token = match current {
                '/' if self.peek_at(1) == Some('/') => self.advance(2, Token::DoubleSlash),
                '/' => self.advance(1, Token::Slash),
                '(' => self.advance(1, Token::LeftParen),
                ')' => self.advance(1, Token::RightParen),
                '[' => self.advance(1, Token::LeftBracket),
                ']' => self.advance(1, Token::RightBracket),
                '@' => self.advance(1, Token::At),
                ',' => self.advance(1, Token::Comma),
                '|' => self.advance(1, Token::Pipe),
                '+' => self.advance(1, Token::Plus),
                '-' => self.advance(1, Token::Minus),
                '=' => self.advance(1, Token::Equal),
                '!' if self.peek_at(1) == Some('=') => self.advance(2, Token::NotEqual),
                '<' if self.peek_at(1) == Some('=') => self.advance(2, Token::LessOrEqual),
                '<' => self.advance(1, Token::Less),
                '>' if self.peek_at(1) == Some('=') => self.advance(2, Token::GreaterOrEqual),
                '>' => self.advance(1, Token::Greater),
                '.' if self.peek_at(1) == Some('.') => self.advance(2, Token::DoubleDot),
                '.' if self.peek_at(1).is_some_and(|next| next.is_ascii_digit()) => {
                    self.read_number()
                }
                '.' => self.advance(1, Token::Dot),
                '\'' | '"' => self.read_literal(current)?,
                '*' if self.expects_operator() => self.advance(1, Token::Multiply),
                '*' => self.advance(
                    1,
                    Token::NameTest(NodeTest::Name {
                        namespace: NamespaceTest::Any,
                        local: None,
                    }),
                ),
                '{' => self.read_uri_name()?,
                digit if digit.is_ascii_digit() => self.read_number(),
                start if is_name_start(start) => self.read_name_token()?,
                other => return Err(self.error(&format!("unexpected character '{other}'"))),
            };
            self.tokens.push(token);
        }
    }

    fn advance(&mut self, length: usize, token: Token) -> Token {
        self.position += length;
        token
    }

    fn read_while(&mut self, accept: fn(char) -> bool) -> String {
        let start = self.position;
        while self.peek_at(0).is_some_and(accept) {
            self.position += 1;
        }
        self.chars[start..self.position].iter().collect()
    }

    fn read_number(&mut self) -> Token {
        let text = self.read_while(|character| character.is_ascii_digit() || character == '.');
        Token::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn read_literal(&mut self, quote: char) -> Result<Token> {
        self.position += 1;
        let start = self.position;
        while let Some(current) = self.peek_at(0) {
            if current == quote {
                let literal = self.chars[start..self.position].iter().collect();
                self.position += 1;
                return Ok(Token::Literal(literal));
            }
            self.position += 1;
        }
        Err(self.error("unterminated string literal"))
    }

    fn read_uri_name(&mut self) -> Result<Token> {
        self.position += 1;
        let uri = self.read_while(|character| character != '}');
        if self.peek_at(0) != Some('}') {
            return Err(self.error("missing '}' after namespace uri"));
        }
        self.position += 1;
        let local = if self.peek_at(0) == Some('*') {
            self.position += 1;
            None
        } else {
            let local = self.read_while(is_name_char);
            if local.is_empty() {
                return Err(self.error(&format!("missing local name after '{{{uri}}}'")));
            }
            Some(local)
        };
        Ok(Token::NameTest(NodeTest::Name {
            namespace: NamespaceTest::Uri(uri),
            local,
        }))
    }

    fn read_name_token(&mut self) -> Result<Token> {
        let name = self.read_while(is_name_char);

        if self.expects_operator() {
            return match name.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "div" => Ok(Token::Div),
                "mod" => Ok(Token::Mod),
                _ => Err(self.error(&format!("expected an operator but found '{name}'"))),
            };
        }

        if self.peek_at(0) == Some(':') && self.peek_at(1) != Some(':') {
            self.position += 1;
            let local = if self.peek_at(0) == Some('*') {
                self.position += 1;
                None
            } else {
                let local = self.read_while(is_name_char);
                if local.is_empty() {
                    return Err(self.error(&format!("missing local name after '{name}:'")));
                }
                Some(local)
            };
            let namespace = NamespaceTest::Prefix(name);
            return Ok(self.function_or_name(local, namespace));
        }

        self.skip_whitespace();
        if self.peek_at(0) == Some(':') && self.peek_at(1) == Some(':') {
            self.position += 2;
            return Axis::from_name(&name)
                .map(Token::AxisName)
                .ok_or_else(|| self.error(&format!("unknown axis '{name}'")));
        }
        if self.peek_at(0) == Some('(') {
            return Ok(match name.as_str() {
                "text" | "comment" | "node" | "processing-instruction" => Token::NodeType(name),
                _ => Token::FunctionName(name),
            });
        }
        Ok(Token::NameTest(NodeTest::Name {
            namespace: NamespaceTest::Any,
            local: Some(name),
        }))
    }

    /// Prefixed names followed by `(` are function calls such as `fn:count(...)`.
    fn function_or_name(&mut self, local: Option<String>, namespace: NamespaceTest) -> Token {
        let start = self.position;
        self.skip_whitespace();
        if let (Some(local), Some('(')) = (&local, self.peek_at(0)) {
            return Token::FunctionName(local.clone());
        }
        self.position = start;
        Token::NameTest(NodeTest::Name { namespace, local })
    }
}

struct Parser<'expr> {
    expression: &'expr str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        syntax_error(self.expression, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next_is(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.next_is(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.accept(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.accept(&Token::Or) {
            left = Expr::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.accept(&Token::And) {
            left = Expr::And(Box::new(left), Box::new(self.parse_equality()?));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Equal) => CompareOperator::Equal,
                Some(Token::NotEqual) => CompareOperator::NotEqual,
                _ => return Ok(left),
            };
            self.position += 1;
            left = Expr::Compare(operator, Box::new(left), Box::new(self.parse_relational()?));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Less) => CompareOperator::Less,
                Some(Token::LessOrEqual) => CompareOperator::LessOrEqual,
                Some(Token::Greater) => CompareOperator::Greater,
                Some(Token::GreaterOrEqual) => CompareOperator::GreaterOrEqual,
                _ => return Ok(left),
            };
            self.position += 1;
            left = Expr::Compare(operator, Box::new(left), Box::new(self.parse_additive()?));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Plus) => ArithmeticOperator::Add,
                Some(Token::Minus) => ArithmeticOperator::Subtract,
                _ => return Ok(left),
            };
            self.position += 1;
            left = Expr::Arithmetic(operator, Box::new(left), Box::new(self.parse_multiplicative()?));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Multiply) => ArithmeticOperator::Multiply,
                Some(Token::Div) => ArithmeticOperator::Divide,
                Some(Token::Mod) => ArithmeticOperator::Modulo,
                _ => return Ok(left),
            };
            self.position += 1;
            left = Expr::Arithmetic(operator, Box::new(left), Box::new(self.parse_unary()?));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.accept(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut left = self.parse_path()?;
        while self.accept(&Token::Pipe) {
            left = Expr::Union(Box::new(left), Box::new(self.parse_path()?));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::LeftParen | Token::Literal(_) | Token::Number(_) | Token::FunctionName(_)) => {
                self.parse_filter()
            }
            Some(Token::Slash) => {
                self.position += 1;
                let steps = if self.starts_step() {
                    self.parse_relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.position += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(_) => Ok(Expr::Path {
                absolute: false,
                steps: self.parse_relative_steps()?,
            }),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_filter(&mut self) -> Result<Expr> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let steps = match self.peek() {
            Some(Token::Slash) => {
                self.position += 1;
                self.parse_relative_steps()?
            }
            Some(Token::DoubleSlash) => {
                self.position += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                steps
            }
            _ => Vec::new(),
        };
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        self.position += 1;
        match token {
            Token::LeftParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Token::Literal(text) => Ok(Expr::Literal(text)),
            Token::Number(number) => Ok(Expr::Number(number)),
            Token::FunctionName(name) => {
                self.expect(&Token::LeftParen)?;
                let mut arguments = Vec::new();
                if !self.accept(&Token::RightParen) {
                    loop {
                        arguments.push(self.parse_or()?);
                        if self.accept(&Token::RightParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::Function(name, arguments))
            }
            other => Err(self.error(&format!("unexpected token {other:?}"))),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DoubleDot
                    | Token::At
                    | Token::AxisName(_)
                    | Token::NameTest(_)
                    | Token::NodeType(_)
            )
        )
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.accept(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.accept(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.accept(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.accept(&Token::DoubleDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = match self.peek() {
            Some(Token::At) => {
                self.position += 1;
                Axis::Attribute
            }
            Some(Token::AxisName(axis)) => {
                let axis = *axis;
                self.position += 1;
                axis
            }
            _ => Axis::Child,
        };

        let test = match self.peek().cloned() {
            Some(Token::NameTest(test)) => {
                self.position += 1;
                test
            }
            Some(Token::NodeType(kind)) => {
                self.position += 1;
                self.expect(&Token::LeftParen)?;
                if kind == "processing-instruction" && matches!(self.peek(), Some(Token::Literal(_))) {
                    self.position += 1;
                }
                self.expect(&Token::RightParen)?;
                match kind.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => NodeTest::ProcessingInstruction,
                    _ => NodeTest::Node,
                }
            }
            _ => return Err(self.error("expected a node test")),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.accept(&Token::LeftBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}
