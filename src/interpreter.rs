use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use crate::config::Config;
use crate::dice::{Edge, Ledger, RollOutcome};
use crate::error::{EvaluationError, QuestError, SyntaxError};
use crate::expression::{expression_len, Context, Evaluator};
use crate::lexer::tokenize_line;
use crate::quest::{Quest, QuestBook};
use crate::scope::Scope;
use crate::token::{Kind, Token};
use crate::value::Value;

/// Name the total of the latest accepted roll is stored under.
pub const LAST_ROLL: &str = "last_roll";

/// Lines buffered for a block whose body runs later.
#[derive(Debug, Default)]
pub struct Capture {
    depth: usize,
    lines: Vec<Vec<Token>>,
    pending: Vec<Token>,
}

impl Capture {
    /// Buffers `token`, or returns true if it is the brace that closes the block.
    fn push(&mut self, token: &Token) -> bool {
        match token.kind {
            Kind::LBrace => self.depth += 1,
            Kind::RBrace if self.depth == 0 => return true,
            Kind::RBrace => self.depth -= 1,
            _ => {}
        }
        self.pending.push(token.clone());
        false
    }

    fn end_line(&mut self) {
        if !self.pending.is_empty() {
            self.lines.push(std::mem::take(&mut self.pending));
        }
    }

    fn finish(mut self) -> Vec<Vec<Token>> {
        self.end_line();
        self.lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Sidequest,
    Journey,
}

/// What the incoming tokens feed into. Open blocks stack on top of each other;
/// an empty stack means top level.
#[derive(Debug)]
pub enum InterpreterMode {
    TopLevel,
    DefiningQuest {
        name: String,
        params: Vec<String>,
        body: Capture,
        opened: Token,
    },
    CapturingJourney {
        condition: Vec<Token>,
        body: Capture,
        opened: Token,
    },
    ExecutingTrueBranch {
        opened: Token,
    },
    SkippingFalseBranch {
        kind: BlockKind,
        depth: usize,
        opened: Token,
    },
}

static TOP_LEVEL: InterpreterMode = InterpreterMode::TopLevel;

impl InterpreterMode {
    fn describe(&self) -> &'static str {
        match self {
            InterpreterMode::TopLevel => "top level",
            InterpreterMode::DefiningQuest { .. } => "quest definition",
            InterpreterMode::CapturingJourney { .. } => "journey",
            InterpreterMode::ExecutingTrueBranch { .. } => "sidequest",
            InterpreterMode::SkippingFalseBranch { kind: BlockKind::Sidequest, .. } => "sidequest",
            InterpreterMode::SkippingFalseBranch { kind: BlockKind::Journey, .. } => "journey",
        }
    }

    fn opened(&self) -> Option<&Token> {
        match self {
            InterpreterMode::TopLevel => None,
            InterpreterMode::DefiningQuest { opened, .. }
            | InterpreterMode::CapturingJourney { opened, .. }
            | InterpreterMode::ExecutingTrueBranch { opened }
            | InterpreterMode::SkippingFalseBranch { opened, .. } => Some(opened),
        }
    }
}

/// Cursor over the tokens of one line.
struct TokenStream<'t> {
    tokens: &'t [Token],
    current: usize,
    file_path: &'t Path,
}

impl<'t> TokenStream<'t> {
    fn new(tokens: &'t [Token], file_path: &'t Path) -> Self {
        Self {
            tokens,
            current: 0,
            file_path,
        }
    }

    fn at(&self) -> Option<&'t Token> {
        self.tokens.get(self.current)
    }

    fn next_token(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.current)?;
        self.current += 1;
        Some(token)
    }

    fn rest(&self) -> &'t [Token] {
        &self.tokens[self.current.min(self.tokens.len())..]
    }

    fn advance(&mut self, count: usize) {
        self.current += count;
    }

    fn eat(&mut self, expecting: Kind, what: &str) -> Result<&'t Token, SyntaxError> {
        match self.at() {
            Some(token) if token.kind == expecting => {
                self.current += 1;
                Ok(token)
            }
            Some(token) => Err(SyntaxError::from_token(
                self.file_path.to_path_buf(),
                token,
                format!("Expected {} but got {}", what, token.value),
            )),
            None => Err(self.ended(format!("Expected {} but the line ended", what))),
        }
    }

    fn ended(&self, message: String) -> SyntaxError {
        let (line, position) = match self.tokens.last() {
            Some(token) => (token.line, token.end()),
            None => (0, 1),
        };
        SyntaxError::at_end(self.file_path.to_path_buf(), line, position, message)
    }
}

enum Step {
    Consumed,
    Close,
    Statement,
}

pub struct Interpreter<W: Write> {
    file_path: PathBuf,
    out: W,
    rng: StdRng,
    config: Config,
    scope: Scope,
    quests: QuestBook,
    ledger: Ledger,
    modes: Vec<InterpreterMode>,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W, file_path: impl Into<PathBuf>, config: Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            file_path: file_path.into(),
            out,
            rng,
            config,
            scope: Scope::new(),
            quests: QuestBook::new(),
            ledger: Ledger::new(),
            modes: Vec::new(),
        }
    }

    pub fn mode(&self) -> &InterpreterMode {
        self.modes.last().unwrap_or(&TOP_LEVEL)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.scope.get(name)
    }

    /// Global bindings; quest parameters never show up here.
    pub fn variables(&self) -> &HashMap<String, Value> {
        self.scope.globals()
    }

    pub fn quests(&self) -> &QuestBook {
        &self.quests
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Lexes and runs a whole script, one physical line at a time.
    pub fn run_source(&mut self, source: &str) -> Result<(), QuestError> {
        for (index, line) in source.lines().enumerate() {
            let tokens = tokenize_line(line, &self.file_path, index + 1)?;
            self.execute_line(&tokens)?;
        }
        self.finish()
    }

    /// Fails if a block is still open once the script is over.
    pub fn finish(&mut self) -> Result<(), QuestError> {
        if let Some(mode) = self.modes.last() {
            let message = format!(
                "Unclosed {}: expected '}}' before the end of the script",
                mode.describe()
            );
            let err = match mode.opened() {
                Some(token) => SyntaxError::from_token(self.file_path.clone(), token, message),
                None => SyntaxError::at_end(self.file_path.clone(), 0, 1, message),
            };
            return Err(err.into());
        }

        self.out.flush()?;
        Ok(())
    }

    /// Feeds the tokens of one line into whatever the current mode is.
    pub fn execute_line(&mut self, tokens: &[Token]) -> Result<(), QuestError> {
        let file_path = self.file_path.clone();
        let mut stream = TokenStream::new(tokens, &file_path);

        while let Some(token) = stream.at() {
            let step = match self.modes.last_mut() {
                Some(InterpreterMode::DefiningQuest { body, .. })
                | Some(InterpreterMode::CapturingJourney { body, .. }) => {
                    if body.push(token) {
                        Step::Close
                    } else {
                        Step::Consumed
                    }
                }
                Some(InterpreterMode::SkippingFalseBranch { depth, .. }) => match token.kind {
                    Kind::LBrace => {
                        *depth += 1;
                        Step::Consumed
                    }
                    Kind::RBrace if *depth == 0 => Step::Close,
                    Kind::RBrace => {
                        *depth -= 1;
                        Step::Consumed
                    }
                    _ => Step::Consumed,
                },
                None
                | Some(InterpreterMode::TopLevel)
                | Some(InterpreterMode::ExecutingTrueBranch { .. }) => {
                    if token.kind == Kind::RBrace {
                        Step::Close
                    } else {
                        Step::Statement
                    }
                }
            };

            match step {
                Step::Consumed => {
                    stream.next_token();
                }
                Step::Close => {
                    stream.next_token();
                    self.close_block(token)?;
                }
                Step::Statement => self.execute_statement(&mut stream)?,
            }
        }

        if let Some(InterpreterMode::DefiningQuest { body, .. })
        | Some(InterpreterMode::CapturingJourney { body, .. }) = self.modes.last_mut()
        {
            body.end_line();
        }

        Ok(())
    }

    fn execute_statement(&mut self, stream: &mut TokenStream<'_>) -> Result<(), QuestError> {
        let Some(token) = stream.next_token() else {
            return Ok(());
        };

        match token.kind {
            Kind::Recruit => {
                let name = stream.eat(Kind::Identifier, "identifier after 'recruit'")?;
                let expected = format!("'=' after variable name {}", name.value);
                let assign = stream.eat(Kind::Assign, &expected)?;
                let value = self.evaluate_rest(stream, Context::Assignment, assign)?;
                debug!("recruit {} = {}", name.value, value);
                self.scope.assign(&name.value, value);

                let reward = self.config.rewards.recruit.draw(&mut self.rng);
                self.ledger.earn(reward);
                writeln!(
                    self.out,
                    "You recruited a new variable. You now have {} gold!",
                    self.ledger.gold
                )?;
            }
            Kind::Identifier if self.quests.contains(&token.value) => {
                let args = self.parse_arguments(stream)?;
                self.invoke(token, args)?;
            }
            Kind::Identifier => {
                if !self.scope.contains(&token.value) {
                    let message =
                        format!("Variable {} not an assigned variable or quest", token.value);
                    return Err(self.syntax_error(token, message));
                }
                let expected = format!("'=' after variable name {}", token.value);
                let assign = stream.eat(Kind::Assign, &expected)?;
                let value = self.evaluate_rest(stream, Context::Assignment, assign)?;
                debug!("{} = {}", token.value, value);
                self.scope.assign(&token.value, value);
            }
            Kind::Advantage | Kind::Disadvantage => {
                let (edge, label) = if token.kind == Kind::Advantage {
                    (Edge::Advantage, "advantage")
                } else {
                    (Edge::Disadvantage, "disadvantage")
                };
                self.ledger.buy_edge(edge, self.config.edge_cost);
                writeln!(
                    self.out,
                    "You bought {} on your next dice roll for {} gold. You now have {} gold!",
                    label, self.config.edge_cost, self.ledger.gold
                )?;
            }
            Kind::Roll { count, sides } => self.roll(token, count, sides)?,
            Kind::Quest => self.begin_quest(stream, token)?,
            Kind::Scroll => {
                let value = self.evaluate_rest(stream, Context::Print, token)?;
                writeln!(self.out, "{}", value)?;
            }
            Kind::Sidequest => {
                let (condition, holds) = self.parse_condition(stream, token)?;
                trace!("sidequest condition {:?} -> {}", render(&condition), holds);
                let mode = if holds {
                    InterpreterMode::ExecutingTrueBranch {
                        opened: token.clone(),
                    }
                } else {
                    InterpreterMode::SkippingFalseBranch {
                        kind: BlockKind::Sidequest,
                        depth: 0,
                        opened: token.clone(),
                    }
                };
                self.enter(mode);
            }
            Kind::Journey => {
                let (condition, holds) = self.parse_condition(stream, token)?;
                trace!("journey condition {:?} -> {}", render(&condition), holds);
                let mode = if holds {
                    InterpreterMode::CapturingJourney {
                        condition,
                        body: Capture::default(),
                        opened: token.clone(),
                    }
                } else {
                    InterpreterMode::SkippingFalseBranch {
                        kind: BlockKind::Journey,
                        depth: 0,
                        opened: token.clone(),
                    }
                };
                self.enter(mode);
            }
            _ => {
                return Err(self.syntax_error(token, format!("Unexpected {}", token.value)));
            }
        }

        Ok(())
    }

    fn enter(&mut self, mode: InterpreterMode) {
        debug!("entering {} (depth {})", mode.describe(), self.modes.len() + 1);
        self.modes.push(mode);
    }

    fn close_block(&mut self, closing: &Token) -> Result<(), QuestError> {
        let Some(mode) = self.modes.pop() else {
            return Err(self.unmatched_close(closing));
        };
        debug!("closing {} (depth {})", mode.describe(), self.modes.len());

        match mode {
            InterpreterMode::DefiningQuest { name, params, body, .. } => {
                let quest = Quest {
                    name,
                    params,
                    body: body.finish(),
                };
                debug!("registered quest {} with {} line(s)", quest.name, quest.body.len());
                if self.quests.define(quest).is_some() {
                    debug!("quest redefined, {} known", self.quests.len());
                }
            }
            InterpreterMode::CapturingJourney { condition, body, opened } => {
                self.run_journey(&condition, body.finish(), &opened)?;
            }
            InterpreterMode::ExecutingTrueBranch { .. } => {
                let reward = self.config.rewards.sidequest.draw(&mut self.rng);
                self.ledger.earn(reward);
                writeln!(
                    self.out,
                    "You completed a sidequest! You now have {} gold!",
                    self.ledger.gold
                )?;
            }
            InterpreterMode::SkippingFalseBranch { .. } => {}
            InterpreterMode::TopLevel => {
                return Err(self.unmatched_close(closing));
            }
        }

        Ok(())
    }

    /// Runs the captured body for as long as the condition holds, checking it before every pass.
    fn run_journey(
        &mut self,
        condition: &[Token],
        lines: Vec<Vec<Token>>,
        opened: &Token,
    ) -> Result<(), QuestError> {
        let mut iterations = 0usize;

        loop {
            let holds = Evaluator::new(&self.scope, &self.file_path)
                .evaluate(condition, Context::Assignment, opened)?
                .is_truthy();
            if !holds {
                break;
            }

            iterations += 1;
            if iterations > self.config.max_iterations {
                let message = format!(
                    "Journey exceeded maximum iteration count ({})",
                    self.config.max_iterations
                );
                let err = EvaluationError::from_token(self.file_path.clone(), opened, message);
                return Err(err.into());
            }

            for line in &lines {
                self.execute_line(line)?;
            }
        }

        debug!("journey finished after {} iteration(s)", iterations);
        Ok(())
    }

    fn begin_quest(
        &mut self,
        stream: &mut TokenStream<'_>,
        keyword: &Token,
    ) -> Result<(), QuestError> {
        let name = stream.eat(Kind::Identifier, "quest name after 'quest'")?;
        stream.eat(Kind::LParen, "'(' after quest name")?;

        let mut params = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let Some(token) = stream.next_token() else {
                let err = stream.ended("Expected ')' to close the quest arguments".to_string());
                return Err(err.into());
            };
            match token.kind {
                Kind::RParen => break,
                Kind::Comma => continue,
                Kind::Identifier => {
                    if !seen.insert(token.value.clone()) {
                        let message = format!("Duplicate quest argument {}", token.value);
                        return Err(self.syntax_error(token, message));
                    }
                    params.push(token.value.clone());
                }
                _ => {
                    let message = format!("Expected quest argument name but got {}", token.value);
                    return Err(self.syntax_error(token, message));
                }
            }
        }

        stream.eat(Kind::LBrace, "'{' after quest arguments")?;
        self.enter(InterpreterMode::DefiningQuest {
            name: name.value.clone(),
            params,
            body: Capture::default(),
            opened: keyword.clone(),
        });
        Ok(())
    }

    /// Arguments are numbers or identifiers. Bound identifiers pass their value,
    /// unbound ones pass their own name as text.
    fn parse_arguments(&mut self, stream: &mut TokenStream<'_>) -> Result<Vec<Value>, QuestError> {
        stream.eat(Kind::LParen, "'(' after quest name")?;

        let mut args = Vec::new();
        loop {
            let Some(token) = stream.next_token() else {
                let err = stream.ended("Expected ')' to close the quest call".to_string());
                return Err(err.into());
            };
            match token.kind {
                Kind::RParen => break,
                Kind::Comma => continue,
                Kind::Number => {
                    let value = token.value.parse::<i64>().map_err(|_| {
                        let message = format!("Invalid number {}", token.value);
                        EvaluationError::from_token(self.file_path.clone(), token, message)
                    })?;
                    args.push(Value::Int(value));
                }
                Kind::Identifier => {
                    let value = self
                        .scope
                        .get(&token.value)
                        .cloned()
                        .unwrap_or_else(|| Value::Text(token.value.clone()));
                    args.push(value);
                }
                _ => {
                    let message = format!("Expected quest argument but got {}", token.value);
                    return Err(self.syntax_error(token, message));
                }
            }
        }

        Ok(args)
    }

    fn invoke(&mut self, call_site: &Token, args: Vec<Value>) -> Result<(), QuestError> {
        let Some(quest) = self.quests.get(&call_site.value).cloned() else {
            return Err(self.syntax_error(call_site, format!("Unknown quest {}", call_site.value)));
        };

        let frame = quest.bind(args, call_site, &self.file_path)?;

        if self.scope.depth() >= self.config.max_call_depth {
            let message = format!("Quest call depth exceeded ({})", self.config.max_call_depth);
            let err = EvaluationError::from_token(self.file_path.clone(), call_site, message);
            return Err(err.into());
        }

        debug!("invoking quest {} with {:?}", quest.name, frame);
        self.scope.push_frame(frame);
        let result = quest.body.iter().try_for_each(|line| self.execute_line(line));
        self.scope.pop_frame();
        result?;

        let reward = self.config.rewards.quest.draw(&mut self.rng);
        self.ledger.earn(reward);
        writeln!(
            self.out,
            "You completed the quest {}! You now have {} gold!",
            quest.name, self.ledger.gold
        )?;
        Ok(())
    }

    fn roll(&mut self, token: &Token, count: i64, sides: i64) -> Result<(), QuestError> {
        if sides == 0 {
            let message = format!(
                "Invalid roll syntax: {} (dice need at least one side)",
                token.value
            );
            return Err(self.syntax_error(token, message));
        }

        match self.ledger.try_roll(&mut self.rng, count, sides) {
            Some(outcome) => {
                debug!("{:?}", outcome);
                self.report_roll(&outcome)?;
                self.scope.assign(LAST_ROLL, Value::Int(outcome.total));
                writeln!(
                    self.out,
                    "You rolled {} {}-sided dice. You now have {} gold!",
                    count, sides, self.ledger.gold
                )?;
            }
            None => {
                debug!("refused roll {}d{} with {} gold", count, sides, self.ledger.gold);
                writeln!(self.out, "Not Enough gold!")?;
            }
        }

        Ok(())
    }

    fn report_roll(&mut self, outcome: &RollOutcome) -> Result<(), QuestError> {
        match outcome.edge {
            Edge::Plain => {
                writeln!(
                    self.out,
                    "Rolling {}d{}: {}",
                    outcome.count, outcome.sides, outcome.total
                )?;
            }
            Edge::Advantage | Edge::Disadvantage => {
                let label = if outcome.edge == Edge::Advantage {
                    "advantage"
                } else {
                    "disadvantage"
                };
                writeln!(self.out, "Rolling with {}!", label)?;
                let sums = outcome
                    .sums
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    self.out,
                    "Rolling {}d{}: {} --> {}",
                    outcome.count, outcome.sides, sums, outcome.total
                )?;
            }
        }
        Ok(())
    }

    /// Parses `( condition ) {` and evaluates the condition once.
    fn parse_condition(
        &mut self,
        stream: &mut TokenStream<'_>,
        keyword: &Token,
    ) -> Result<(Vec<Token>, bool), QuestError> {
        let open = stream.eat(Kind::LParen, &format!("'(' after '{}'", keyword.value))?;

        let mut condition = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = stream.next_token() else {
                return Err(stream.ended("Expected ending ')'".to_string()).into());
            };
            match token.kind {
                Kind::LParen => depth += 1,
                Kind::RParen if depth == 0 => break,
                Kind::RParen => depth -= 1,
                _ => {}
            }
            condition.push(token.clone());
        }

        let holds = Evaluator::new(&self.scope, &self.file_path)
            .evaluate(&condition, Context::Assignment, open)?
            .is_truthy();

        stream.eat(Kind::LBrace, "opening bracket after condition")?;
        Ok((condition, holds))
    }

    fn evaluate_rest(
        &self,
        stream: &mut TokenStream<'_>,
        context: Context,
        anchor: &Token,
    ) -> Result<Value, QuestError> {
        let rest = stream.rest();
        let len = expression_len(rest);
        stream.advance(len);

        let evaluator = Evaluator::new(&self.scope, &self.file_path);
        Ok(evaluator.evaluate(&rest[..len], context, anchor)?)
    }

    fn syntax_error(&self, token: &Token, message: String) -> QuestError {
        SyntaxError::from_token(self.file_path.clone(), token, message).into()
    }

    fn unmatched_close(&self, closing: &Token) -> QuestError {
        self.syntax_error(closing, "Unexpected '}' with no open block".to_string())
    }
}

fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|token| token.value.as_str()).collect::<Vec<_>>().join(" ")
}
