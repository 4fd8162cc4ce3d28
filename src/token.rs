use serde::Serialize;

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Token {
    pub(crate) line: usize,
    pub(crate) position: usize,
    pub(crate) kind: Kind,
    pub(crate) value: String
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Kind {
    // Brackets and delimiters
    LParen,      // (
    RParen,      // )
    LBrace,      // {
    RBrace,      // }
    Comma,       // ,

    // Operators
    Assign,      // =
    Heals,       // heals (+)
    Damaged,     // damaged (-)
    Powerup,     // powerup (*)
    Weaken,      // weaken (/)
    Equal,       // ==
    NotEqual,    // !=
    Greater,     // >
    Less,        // <
    GreaterEq,   // >=
    LessEq,      // <=

    // Keywords
    Quest,       // quest
    Recruit,     // recruit
    Sidequest,   // sidequest
    Journey,     // journey
    Scroll,      // scroll
    Advantage,   // gold.adv()
    Disadvantage, // gold.disadv()
    Roll { count: i64, sides: i64 }, // roll 2d6

    // Identifiers and literals
    Identifier,
    Number,
}

impl Kind {
    pub fn is_operator(&self) -> bool {
        self.is_arithmetic() || self.is_comparison()
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Kind::Heals | Kind::Damaged | Kind::Powerup | Kind::Weaken)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Kind::Equal
                | Kind::NotEqual
                | Kind::Greater
                | Kind::Less
                | Kind::GreaterEq
                | Kind::LessEq
        )
    }

    /// Whether a token of this kind can appear inside an expression.
    pub fn is_expression(&self) -> bool {
        self.is_operator()
            || matches!(self, Kind::Number | Kind::Identifier | Kind::LParen | Kind::RParen)
    }
}

impl Token {
    /// Column just past the end of this token, used when the line runs out.
    pub fn end(&self) -> usize {
        self.position + self.value.chars().count()
    }
}
