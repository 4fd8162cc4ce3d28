use std::path::Path;
use crate::error::EvaluationError;
use crate::scope::Scope;
use crate::token::{Kind, Token};
use crate::value::Value;

/// Deepest run of nested parentheses and prefix operators one expression may hold.
pub const MAX_NESTING: usize = 128;

/// Where an expression sits decides how identifiers and parentheses are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Right-hand side of an assignment or a sidequest/journey condition.
    Assignment,
    /// Argument of `scroll`.
    Print,
}

#[derive(Debug, Clone)]
enum Term {
    Number(i64, Token),
    Text(String),
    Operator(Token),
    Open(Token),
    Close(Token),
}

impl Term {
    fn token(&self) -> Option<&Token> {
        match self {
            Term::Number(_, token)
            | Term::Operator(token)
            | Term::Open(token)
            | Term::Close(token) => Some(token),
            Term::Text(_) => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Term::Number(n, _) => n.to_string(),
            Term::Text(text) => text.clone(),
            Term::Operator(token) | Term::Open(token) | Term::Close(token) => token.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(i64),
    Unary {
        operator: Token,
        operand: Box<Expr>,
    },
    /// Left-associative run of operators of one precedence level.
    Chain {
        first: Box<Expr>,
        rest: Vec<(Token, Expr)>,
    },
    Comparison {
        first: Box<Expr>,
        rest: Vec<(Token, Expr)>,
    },
}

/// Number of leading tokens that belong to the expression. Stops at the first
/// token that cannot be part of one, or at a `)` without a matching `(`.
pub fn expression_len(tokens: &[Token]) -> usize {
    let mut depth = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            Kind::LParen => depth += 1,
            Kind::RParen if depth == 0 => return index,
            Kind::RParen => depth -= 1,
            kind if kind.is_expression() => {}
            _ => return index,
        }
    }

    tokens.len()
}

pub struct Evaluator<'a> {
    scope: &'a Scope,
    file_path: &'a Path,
}

impl<'a> Evaluator<'a> {
    pub fn new(scope: &'a Scope, file_path: &'a Path) -> Self {
        Self { scope, file_path }
    }

    /// Evaluates `tokens`. `anchor` is the token right before the expression and
    /// locates errors for expressions that are empty or end early.
    pub fn evaluate(
        &self,
        tokens: &[Token],
        context: Context,
        anchor: &Token,
    ) -> Result<Value, EvaluationError> {
        let terms = self.resolve(tokens, context)?;

        if terms.is_empty() {
            return match context {
                Context::Print => Ok(Value::Text(String::new())),
                Context::Assignment => {
                    Err(self.error_at_end(anchor, "Expected an expression".to_string()))
                }
            };
        }

        if context == Context::Print && terms.iter().any(|term| matches!(term, Term::Text(_))) {
            return Ok(Self::render(&terms));
        }

        let tree = self.parse(&terms, anchor)?;
        self.eval(&tree).map(Value::Int)
    }

    fn resolve(&self, tokens: &[Token], context: Context) -> Result<Vec<Term>, EvaluationError> {
        let mut terms = Vec::with_capacity(tokens.len());

        for token in tokens {
            let term = match token.kind {
                Kind::Number => {
                    let value = token.value.parse::<i64>().map_err(|_| {
                        self.error(token, format!("Invalid number {}", token.value))
                    })?;
                    Term::Number(value, token.clone())
                }
                Kind::Identifier => match (self.scope.get(&token.value), context) {
                    (Some(Value::Int(n)), _) => Term::Number(*n, token.clone()),
                    (Some(Value::Text(text)), Context::Print) => Term::Text(text.clone()),
                    (Some(value), Context::Assignment) => {
                        let n = value.as_int().ok_or_else(|| {
                            let message = format!(
                                "Variable {} holds {:?}, which is not a number",
                                token.value,
                                value.to_string()
                            );
                            self.error(token, message)
                        })?;
                        Term::Number(n, token.clone())
                    }
                    (None, Context::Print) => Term::Text(token.value.clone()),
                    (None, Context::Assignment) => Term::Number(0, token.clone()),
                },
                Kind::LParen | Kind::RParen if context == Context::Print => continue,
                Kind::LParen => Term::Open(token.clone()),
                Kind::RParen => Term::Close(token.clone()),
                kind if kind.is_operator() => Term::Operator(token.clone()),
                _ => {
                    let message = format!("Unexpected {} in expression", token.value);
                    return Err(self.error(token, message));
                }
            };
            terms.push(term);
        }

        Ok(terms)
    }

    fn render(terms: &[Term]) -> Value {
        let text = terms.iter().map(Term::render).collect::<Vec<_>>().join(" ");
        Value::Text(text)
    }

    fn parse(&self, terms: &[Term], anchor: &Token) -> Result<Expr, EvaluationError> {
        let mut parser = ExprParser {
            terms,
            current: 0,
            depth: 0,
            evaluator: self,
            last: anchor,
        };
        let tree = parser.parse_comparison()?;

        if let Some(extra) = terms.get(parser.current) {
            let message = match extra {
                Term::Number(n, _) => format!("Unexpected number {} without an operator", n),
                other => format!("Unexpected {} without an operator", other.render()),
            };
            return Err(match extra.token() {
                Some(token) => self.error(token, message),
                None => self.error_at_end(parser.last, message),
            });
        }

        Ok(tree)
    }

    fn eval(&self, tree: &Expr) -> Result<i64, EvaluationError> {
        match tree {
            Expr::Literal(n) => Ok(*n),
            Expr::Unary { operator, operand } => {
                let value = self.eval(operand)?;
                match operator.kind {
                    Kind::Damaged => value
                        .checked_neg()
                        .ok_or_else(|| self.error(operator, "Integer overflow".to_string())),
                    _ => Ok(value),
                }
            }
            Expr::Chain { first, rest } => {
                let mut left = self.eval(first)?;
                for (operator, rhs) in rest {
                    let right = self.eval(rhs)?;
                    left = self.apply(operator, left, right)?;
                }
                Ok(left)
            }
            Expr::Comparison { first, rest } => {
                let mut left = self.eval(first)?;
                let mut holds = true;
                for (operator, rhs) in rest {
                    let right = self.eval(rhs)?;
                    holds &= match operator.kind {
                        Kind::Equal => left == right,
                        Kind::NotEqual => left != right,
                        Kind::Greater => left > right,
                        Kind::Less => left < right,
                        Kind::GreaterEq => left >= right,
                        Kind::LessEq => left <= right,
                        _ => {
                            let message = format!("Unknown comparison {}", operator.value);
                            return Err(self.error(operator, message));
                        }
                    };
                    left = right;
                }
                Ok(holds as i64)
            }
        }
    }

    fn apply(&self, operator: &Token, left: i64, right: i64) -> Result<i64, EvaluationError> {
        let result = match operator.kind {
            Kind::Heals => left.checked_add(right),
            Kind::Damaged => left.checked_sub(right),
            Kind::Powerup => left.checked_mul(right),
            Kind::Weaken if right == 0 => {
                return Err(self.error(operator, "Division by zero".to_string()));
            }
            Kind::Weaken => left.checked_div(right),
            _ => {
                return Err(self.error(operator, format!("Unknown operator {}", operator.value)));
            }
        };
        result.ok_or_else(|| self.error(operator, "Integer overflow".to_string()))
    }

    fn error(&self, token: &Token, message: String) -> EvaluationError {
        EvaluationError::from_token(self.file_path.to_path_buf(), token, message)
    }

    fn error_at_end(&self, token: &Token, message: String) -> EvaluationError {
        EvaluationError::new(self.file_path.to_path_buf(), message, token.line, token.end())
    }
}

fn is_additive(kind: &Kind) -> bool {
    matches!(kind, Kind::Heals | Kind::Damaged)
}

fn is_multiplicative(kind: &Kind) -> bool {
    matches!(kind, Kind::Powerup | Kind::Weaken)
}

fn chain(first: Expr, rest: Vec<(Token, Expr)>) -> Expr {
    if rest.is_empty() {
        first
    } else {
        Expr::Chain {
            first: Box::new(first),
            rest,
        }
    }
}

/// Precedence climbing over resolved terms, loosest first:
/// comparison, additive, multiplicative, unary, primary.
struct ExprParser<'t, 'e> {
    terms: &'t [Term],
    current: usize,
    depth: usize,
    evaluator: &'e Evaluator<'e>,
    last: &'t Token,
}

impl<'t, 'e> ExprParser<'t, 'e> {
    fn at(&self) -> Option<&'t Term> {
        self.terms.get(self.current)
    }

    fn next_term(&mut self) -> Option<&'t Term> {
        let term = self.terms.get(self.current)?;
        self.current += 1;
        if let Some(token) = term.token() {
            self.last = token;
        }
        Some(term)
    }

    fn next_operator_if(&mut self, accept: fn(&Kind) -> bool) -> Option<Token> {
        match self.at() {
            Some(Term::Operator(token)) if accept(&token.kind) => {
                self.next_term();
                Some(token.clone())
            }
            _ => None,
        }
    }

    fn descend(&mut self, token: &Token) -> Result<(), EvaluationError> {
        if self.depth >= MAX_NESTING {
            let message =
                format!("Expression nested too deeply (more than {} levels)", MAX_NESTING);
            return Err(self.evaluator.error(token, message));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvaluationError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();

        while let Some(operator) = self.next_operator_if(Kind::is_comparison) {
            rest.push((operator, self.parse_additive()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Comparison {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, EvaluationError> {
        let first = self.parse_multiplicative()?;
        let mut rest = Vec::new();

        while let Some(operator) = self.next_operator_if(is_additive) {
            rest.push((operator, self.parse_multiplicative()?));
        }

        Ok(chain(first, rest))
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvaluationError> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();

        while let Some(operator) = self.next_operator_if(is_multiplicative) {
            rest.push((operator, self.parse_unary()?));
        }

        Ok(chain(first, rest))
    }

    fn parse_unary(&mut self) -> Result<Expr, EvaluationError> {
        if let Some(operator) = self.next_operator_if(is_additive) {
            self.descend(&operator)?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvaluationError> {
        match self.next_term() {
            Some(Term::Number(n, _)) => Ok(Expr::Literal(*n)),
            Some(Term::Open(open)) => {
                self.descend(open)?;
                let expr = self.parse_comparison()?;
                self.depth -= 1;
                match self.next_term() {
                    Some(Term::Close(_)) => Ok(expr),
                    Some(other) => Err(self.unexpected(other)),
                    None => Err(self.evaluator.error(open, "Expected ending ')'".to_string())),
                }
            }
            Some(other) => Err(self.unexpected(other)),
            None => {
                let message = format!("Expression ended early after {}", self.last.value);
                Err(self.evaluator.error_at_end(self.last, message))
            }
        }
    }

    fn unexpected(&self, term: &Term) -> EvaluationError {
        let message = format!("Unexpected {} in expression", term.render());
        match term.token() {
            Some(token) => self.evaluator.error(token, message),
            None => self.evaluator.error_at_end(self.last, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_line;
    use rstest::rstest;
    use std::path::PathBuf;

    fn anchor() -> Token {
        Token {
            line: 1,
            position: 1,
            kind: Kind::Assign,
            value: "=".to_string(),
        }
    }

    fn evaluate_in(
        scope: &Scope,
        source: &str,
        context: Context,
    ) -> Result<Value, EvaluationError> {
        let path = PathBuf::from("test.qlang");
        let tokens = tokenize_line(source, &path, 1).unwrap();
        Evaluator::new(scope, &path).evaluate(&tokens, context, &anchor())
    }

    fn evaluate(source: &str, context: Context) -> Result<Value, EvaluationError> {
        let mut scope = Scope::new();
        scope.assign("hp", Value::Int(10));
        scope.assign("hero", Value::Text("Aria".to_string()));
        evaluate_in(&scope, source, context)
    }

    #[rstest]
    #[case("5", 5)]
    #[case("2 heals 3 powerup 4", 14)]
    #[case("(2 heals 3) powerup 4", 20)]
    #[case("20 weaken 3", 6)]
    #[case("damaged 7 weaken 2", -3)]
    #[case("10 damaged 4 damaged 3", 3)]
    #[case("hp heals 1", 11)]
    #[case("ghost heals 1", 1)]
    #[case("1 < 2", 1)]
    #[case("1 > 2", 0)]
    #[case("hp >= 10", 1)]
    #[case("hp <= 9", 0)]
    #[case("hp == 10", 1)]
    #[case("hp != 10", 0)]
    #[case("1 < 2 < 3", 1)]
    #[case("3 > 2 > 2", 0)]
    #[case("1 heals 1 == 2", 1)]
    fn evaluates_assignments(#[case] source: &str, #[case] expected: i64) {
        assert_eq!(evaluate(source, Context::Assignment).unwrap(), Value::Int(expected));
    }

    #[rstest]
    #[case("hp", "10")]
    #[case("hp heals 5", "15")]
    #[case("(1 heals 2) powerup 3", "7")]
    #[case("hello", "hello")]
    #[case("hello world", "hello world")]
    #[case("hero heals 1", "Aria heals 1")]
    #[case("ghost heals hp", "ghost heals 10")]
    #[case("hp (heals) 1", "11")]
    #[case("", "")]
    fn evaluates_prints(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(evaluate(source, Context::Print).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("1 2", "Unexpected number 2 without an operator")]
    #[case("hp 2", "Unexpected number 2 without an operator")]
    #[case("1 heals", "Expression ended early")]
    #[case("heals", "Expression ended early")]
    #[case("1 powerup powerup 2", "Unexpected powerup")]
    #[case("(1 heals 2", "Expected ending ')'")]
    #[case("4 weaken 0", "Division by zero")]
    #[case("9223372036854775807 heals 1", "Integer overflow")]
    #[case("", "Expected an expression")]
    #[case("hero heals 1", "not a number")]
    fn reports_evaluation_errors(#[case] source: &str, #[case] message: &str) {
        let err = evaluate(source, Context::Assignment).unwrap_err();
        assert!(err.message.contains(message), "{:?} did not contain {:?}", err.message, message);
    }

    #[rstest]
    #[case("hp weaken 0", "Division by zero")]
    #[case("1 2", "Unexpected number 2 without an operator")]
    #[case("1 heals", "Expression ended early after heals")]
    #[case("heals powerup 3", "Unexpected powerup")]
    fn print_context_reports_numeric_errors(#[case] source: &str, #[case] message: &str) {
        let err = evaluate(source, Context::Print).unwrap_err();
        assert!(err.message.contains(message), "{:?} did not contain {:?}", err.message, message);
    }

    #[test]
    fn nesting_within_the_limit_evaluates() {
        let source = format!("{}7{}", "( ".repeat(MAX_NESTING), " )".repeat(MAX_NESTING));
        assert_eq!(evaluate(&source, Context::Assignment).unwrap(), Value::Int(7));

        let source = format!("{}7", "damaged ".repeat(MAX_NESTING));
        assert_eq!(evaluate(&source, Context::Assignment).unwrap(), Value::Int(7));
    }

    #[rstest]
    #[case(format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000)), Context::Assignment)]
    #[case(format!("{}1", "damaged ".repeat(10_000)), Context::Assignment)]
    #[case(format!("{}1", "heals ".repeat(10_000)), Context::Print)]
    fn deep_nesting_is_an_error(#[case] source: String, #[case] context: Context) {
        let err = evaluate(&source, context).unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{:?}", err.message);
    }

    #[test]
    fn print_context_drops_parentheses_before_nesting_counts() {
        let source = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&source, Context::Print).unwrap(), Value::Int(1));
    }

    #[test]
    fn long_operator_chains_do_not_nest() {
        let source = format!("0{}", " heals 1".repeat(50_000));
        assert_eq!(evaluate(&source, Context::Assignment).unwrap(), Value::Int(50_000));
    }

    #[test]
    fn numeric_text_counts_as_number() {
        let mut scope = Scope::new();
        scope.assign("count", Value::Text("4".to_string()));
        let value = evaluate_in(&scope, "count powerup 2", Context::Assignment).unwrap();
        assert_eq!(value, Value::Int(8));
    }

    #[rstest]
    #[case("x heals 1 }", 3)]
    #[case("(x) scroll x", 3)]
    #[case("x < 3) {", 3)]
    #[case("(x < 3)) {", 5)]
    #[case("recruit", 0)]
    #[case("1 heals 2", 3)]
    fn measures_expressions(#[case] source: &str, #[case] expected: usize) {
        let path = PathBuf::from("test.qlang");
        let tokens = tokenize_line(source, &path, 1).unwrap();
        assert_eq!(expression_len(&tokens), expected);
    }
}
