use std::collections::HashMap;
use std::path::Path;
use crate::error::ArityError;
use crate::token::Token;
use crate::value::Value;

/// A user-defined procedure. The body keeps the tokens of every line captured
/// between the opening and closing braces.
#[derive(Debug, Clone)]
pub struct Quest {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Vec<Token>>,
}

impl Quest {
    /// Pairs parameters with arguments. Fails before anything is bound if the counts differ.
    pub fn bind(
        &self,
        args: Vec<Value>,
        call_site: &Token,
        file_path: &Path,
    ) -> Result<HashMap<String, Value>, ArityError> {
        if args.len() != self.params.len() {
            return Err(ArityError {
                path: file_path.to_path_buf(),
                quest: self.name.clone(),
                expected: self.params.len(),
                found: args.len(),
                line: call_site.line,
                position: call_site.position,
            });
        }

        Ok(self.params.iter().cloned().zip(args).collect())
    }
}

#[derive(Debug, Default)]
pub struct QuestBook {
    quests: HashMap<String, Quest>,
}

impl QuestBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a quest, replacing any earlier one with the same name.
    pub fn define(&mut self, quest: Quest) -> Option<Quest> {
        self.quests.insert(quest.name.clone(), quest)
    }

    pub fn get(&self, name: &str) -> Option<&Quest> {
        self.quests.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.quests.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}
