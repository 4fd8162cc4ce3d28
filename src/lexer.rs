use std::path::Path;
use std::sync::LazyLock;
use regex::{CaptureMatches, Captures, Regex};
use crate::error::LexingError;
use crate::token::{Kind, Token};

/// Token patterns in priority order. Earlier alternatives win when several match
/// at the same position, so keywords shadow identifiers of the same spelling.
const TOKEN_SPECIFICATION: &[(&str, &str)] = &[
    ("NUMBER", r"[0-9]+"),
    ("ROLL", r"roll\s*(?P<count>[0-9]+)d(?P<sides>[0-9]+)"),
    ("ADV", r"gold\.adv\(\)"),
    ("DISADV", r"gold\.disadv\(\)"),
    ("QUEST", r"quest\b"),
    ("COMMA", r","),
    ("RECRUIT", r"recruit\b"),
    ("SIDEQUEST", r"sidequest\b"),
    ("JOURNEY", r"journey\b"),
    ("LPAREN", r"\("),
    ("RPAREN", r"\)"),
    ("LBRACE", r"\{"),
    ("RBRACE", r"\}"),
    ("EQUAL", r"=="),
    ("UNEQUAL", r"!="),
    ("GREATEREQ", r">="),
    ("LESSEQ", r"<="),
    ("GREATER", r">"),
    ("LESS", r"<"),
    ("ASSIGN", r"="),
    ("SCROLL", r"scroll\b"),
    ("MULT", r"powerup\b"),
    ("DIV", r"weaken\b"),
    ("PLUS", r"heals\b"),
    ("MINUS", r"damaged\b"),
    ("IDENTIFIER", r"[A-Za-z_][A-Za-z0-9_]*"),
    ("COMMENT", r"#.*"),
    ("SKIP", r"[ \t\r\n]+"),
    ("MISMATCH", r"."),
];

static MASTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = TOKEN_SPECIFICATION
        .iter()
        .map(|(name, pattern)| format!("(?P<{}>{})", name, pattern))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&pattern).expect("token specification must be a valid regular expression")
});

/// Lazily splits one line of source into tokens. Stops for good after the first error.
pub struct Lexer<'a> {
    source_code: &'a str,
    file_name: &'a Path,
    line: usize,
    matches: CaptureMatches<'static, 'a>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file_name: &'a Path, line: usize) -> Self {
        Self {
            source_code: input,
            file_name,
            line,
            matches: MASTER_PATTERN.captures_iter(input),
            failed: false,
        }
    }

    fn error(&mut self, message: String, position: usize) -> LexingError {
        self.failed = true;
        LexingError::new(self.file_name.to_path_buf(), message, self.line, position)
    }

    fn column(&self, offset: usize) -> usize {
        self.source_code[..offset].chars().count() + 1
    }

    fn parse_number(&mut self, text: &str, position: usize) -> Result<i64, LexingError> {
        text.parse::<i64>()
            .map_err(|_| self.error(format!("Number literal {} is too large", text), position))
    }

    fn classify(&mut self, caps: &Captures<'a>) -> Result<Option<Token>, LexingError> {
        let Some((name, matched)) = TOKEN_SPECIFICATION
            .iter()
            .find_map(|(name, _)| caps.name(name).map(|m| (*name, m)))
        else {
            return Ok(None);
        };

        let value = matched.as_str();
        let position = self.column(matched.start());

        let kind = match name {
            "NUMBER" => {
                self.parse_number(value, position)?;
                Kind::Number
            }
            "ROLL" => {
                let count = caps.name("count").map_or("", |m| m.as_str());
                let sides = caps.name("sides").map_or("", |m| m.as_str());
                Kind::Roll {
                    count: self.parse_number(count, position)?,
                    sides: self.parse_number(sides, position)?,
                }
            }
            "ADV" => Kind::Advantage,
            "DISADV" => Kind::Disadvantage,
            "QUEST" => Kind::Quest,
            "COMMA" => Kind::Comma,
            "RECRUIT" => Kind::Recruit,
            "SIDEQUEST" => Kind::Sidequest,
            "JOURNEY" => Kind::Journey,
            "LPAREN" => Kind::LParen,
            "RPAREN" => Kind::RParen,
            "LBRACE" => Kind::LBrace,
            "RBRACE" => Kind::RBrace,
            "EQUAL" => Kind::Equal,
            "UNEQUAL" => Kind::NotEqual,
            "GREATEREQ" => Kind::GreaterEq,
            "LESSEQ" => Kind::LessEq,
            "GREATER" => Kind::Greater,
            "LESS" => Kind::Less,
            "ASSIGN" => Kind::Assign,
            "SCROLL" => Kind::Scroll,
            "MULT" => Kind::Powerup,
            "DIV" => Kind::Weaken,
            "PLUS" => Kind::Heals,
            "MINUS" => Kind::Damaged,
            "IDENTIFIER" => Kind::Identifier,
            "COMMENT" | "SKIP" => return Ok(None),
            _ => {
                return Err(self.error(format!("Unexpected character '{}'", value), position));
            }
        };

        Ok(Some(Token {
            line: self.line,
            position,
            kind,
            value: value.to_string(),
        }))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some(caps) = self.matches.next() {
            match self.classify(&caps) {
                Ok(Some(token)) => return Some(Ok(token)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }

        None
    }
}

pub fn tokenize_line(
    source: &str,
    file_name: &Path,
    line: usize,
) -> Result<Vec<Token>, LexingError> {
    Lexer::new(source, file_name, line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    fn kinds(source: &str) -> Vec<Kind> {
        let path = PathBuf::from("test.qlang");
        tokenize_line(source, &path, 1)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[rstest]
    #[case("recruit x = 5", vec![Kind::Recruit, Kind::Identifier, Kind::Assign, Kind::Number])]
    #[case("scroll x heals 1", vec![Kind::Scroll, Kind::Identifier, Kind::Heals, Kind::Number])]
    #[case("a damaged b powerup c weaken d", vec![
        Kind::Identifier, Kind::Damaged, Kind::Identifier, Kind::Powerup,
        Kind::Identifier, Kind::Weaken, Kind::Identifier,
    ])]
    #[case("sidequest (x >= 3) {", vec![
        Kind::Sidequest, Kind::LParen, Kind::Identifier, Kind::GreaterEq,
        Kind::Number, Kind::RParen, Kind::LBrace,
    ])]
    #[case("== != <= < > =", vec![
        Kind::Equal, Kind::NotEqual, Kind::LessEq, Kind::Less, Kind::Greater, Kind::Assign,
    ])]
    #[case("quest greet(name, title) {", vec![
        Kind::Quest, Kind::Identifier, Kind::LParen, Kind::Identifier, Kind::Comma,
        Kind::Identifier, Kind::RParen, Kind::LBrace,
    ])]
    #[case("journey (i < 3) { }", vec![
        Kind::Journey, Kind::LParen, Kind::Identifier, Kind::Less, Kind::Number, Kind::RParen,
        Kind::LBrace, Kind::RBrace,
    ])]
    #[case("gold.adv() gold.disadv()", vec![Kind::Advantage, Kind::Disadvantage])]
    #[case("roll 2d6", vec![Kind::Roll { count: 2, sides: 6 }])]
    #[case("roll1d20", vec![Kind::Roll { count: 1, sides: 20 }])]
    #[case("questline recruits scrolls", vec![Kind::Identifier; 3])]
    #[case("scroll x # the rest is ignored {", vec![Kind::Scroll, Kind::Identifier])]
    #[case("   \t\r\n", vec![])]
    fn classifies_tokens(#[case] source: &str, #[case] expected: Vec<Kind>) {
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn keywords_shadow_identifiers() {
        assert_eq!(kinds("quest"), vec![Kind::Quest]);
        assert_eq!(kinds("roller"), vec![Kind::Identifier]);
        assert_eq!(kinds("gold"), vec![Kind::Identifier]);
    }

    #[test]
    fn records_positions() {
        let path = PathBuf::from("test.qlang");
        let tokens = tokenize_line("  recruit hero = 12", &path, 7).unwrap();

        assert_eq!(tokens[0].line, 7);
        assert_eq!(tokens[0].position, 3);
        assert_eq!(tokens[1].value, "hero");
        assert_eq!(tokens[1].position, 11);
        assert_eq!(tokens[3].value, "12");
        assert_eq!(tokens[3].end(), 20);
    }

    #[test]
    fn keeps_roll_literal() {
        let path = PathBuf::from("test.qlang");
        let tokens = tokenize_line("roll  3d8", &path, 1).unwrap();
        assert_eq!(tokens[0].value, "roll  3d8");
    }

    #[rstest]
    #[case("recruit x = 5 $", "'$'", 15)]
    #[case("scroll ;", "';'", 8)]
    #[case("gold.adv", "'.'", 5)]
    fn rejects_unknown_characters(
        #[case] source: &str,
        #[case] shown: &str,
        #[case] position: usize,
    ) {
        let path = PathBuf::from("test.qlang");
        let err = tokenize_line(source, &path, 4).unwrap_err();

        assert!(err.message.contains(shown), "{}", err.message);
        assert_eq!(err.line, 4);
        assert_eq!(err.position, position);
    }

    #[test]
    fn stops_after_first_error() {
        let path = PathBuf::from("test.qlang");
        let mut lexer = Lexer::new("$ x", &path, 1);

        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn rejects_oversized_numbers() {
        let path = PathBuf::from("test.qlang");
        let err = tokenize_line("recruit x = 99999999999999999999", &path, 1).unwrap_err();
        assert!(err.message.contains("too large"));
    }
}
