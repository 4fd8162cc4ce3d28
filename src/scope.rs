use std::collections::HashMap;
use crate::value::Value;

/// Variable bindings as a stack of frames. The bottom frame holds the globals;
/// every quest call pushes a frame with its parameters.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<HashMap<String, Value>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Updates the innermost existing binding, otherwise creates a global one.
    pub fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.frames.iter_mut().rev().find_map(|frame| frame.get_mut(name)) {
            *slot = value;
            return;
        }

        self.frames[0].insert(name.to_string(), value);
    }

    pub fn push_frame(&mut self, bindings: HashMap<String, Value>) {
        self.frames.push(bindings);
    }

    /// Drops the innermost call frame. The global frame is never popped.
    pub fn pop_frame(&mut self) -> Option<HashMap<String, Value>> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Number of active call frames, not counting the globals.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.frames[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_names_are_missing() {
        let scope = Scope::new();
        assert_eq!(scope.get("x"), None);
        assert!(!scope.contains("x"));
    }

    #[test]
    fn frames_shadow_and_restore_globals() {
        let mut scope = Scope::new();
        scope.assign("name", Value::Int(1));

        scope.push_frame(HashMap::from([("name".to_string(), Value::Int(2))]));
        assert_eq!(scope.get("name"), Some(&Value::Int(2)));
        scope.assign("name", Value::Int(3));
        assert_eq!(scope.get("name"), Some(&Value::Int(3)));

        scope.pop_frame();
        assert_eq!(scope.get("name"), Some(&Value::Int(1)));
    }

    #[test]
    fn new_names_inside_a_frame_become_globals() {
        let mut scope = Scope::new();
        scope.push_frame(HashMap::new());
        scope.assign("loot", Value::Int(5));
        assert_eq!(scope.depth(), 1);

        scope.pop_frame();
        assert_eq!(scope.get("loot"), Some(&Value::Int(5)));
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn outer_bindings_stay_reachable_from_frames() {
        let mut scope = Scope::new();
        scope.assign("gold_found", Value::Int(1));
        scope.push_frame(HashMap::new());
        scope.assign("gold_found", Value::Int(9));
        scope.pop_frame();

        assert_eq!(scope.globals().get("gold_found"), Some(&Value::Int(9)));
    }

    #[test]
    fn global_frame_cannot_be_popped() {
        let mut scope = Scope::new();
        assert!(scope.pop_frame().is_none());
        assert_eq!(scope.depth(), 0);
    }
}
