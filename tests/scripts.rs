use pretty_assertions::assert_eq;
use quest_lang::config::{RewardRange, Rewards};
use quest_lang::{Config, Interpreter, QuestError, Value};

const ADVENTURE: &str = include_str!("../demos/adventure.qlang");

fn config(seed: u64) -> Config {
    Config {
        rewards: Rewards {
            recruit: RewardRange(1, 1),
            sidequest: RewardRange(2, 2),
            quest: RewardRange(15, 15),
        },
        seed: Some(seed),
        ..Config::default()
    }
}

fn run(source: &str, seed: u64) -> (Interpreter<Vec<u8>>, Result<(), QuestError>) {
    let mut interpreter = Interpreter::new(Vec::new(), "scripts.qlang", config(seed));
    let result = interpreter.run_source(source);
    (interpreter, result)
}

fn lines(interpreter: Interpreter<Vec<u8>>) -> Vec<String> {
    String::from_utf8(interpreter.into_output())
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn adventure_demo_plays_through() {
    let (interpreter, result) = run(ADVENTURE, 7);
    result.unwrap();

    assert_eq!(interpreter.variable("hp"), Some(&Value::Int(4)));
    assert_eq!(interpreter.variable("damage"), None);

    let roll = interpreter.variable("last_roll").and_then(Value::as_int).unwrap();
    assert!((2..=12).contains(&roll));

    // 2 recruits, 2 quests, 1 sidequest, then 10 for advantage and 12 for the dice.
    assert_eq!(interpreter.ledger().gold, 2 + 30 + 2 - 10 - 12);

    let lines = lines(interpreter);
    assert_eq!(
        &lines[..6],
        &[
            "You recruited a new variable. You now have 1 gold!",
            "You recruited a new variable. You now have 2 gold!",
            "the hero takes 3",
            "You completed the quest strike! You now have 17 gold!",
            "the hero takes 3",
            "You completed the quest strike! You now have 32 gold!",
        ]
    );
    assert_eq!(lines[6], "the hero retreats with 4");
    assert_eq!(lines[7], "You completed a sidequest! You now have 34 gold!");
    assert_eq!(
        lines[8],
        "You bought advantage on your next dice roll for 10 gold. You now have 24 gold!"
    );
    assert_eq!(lines[9], "Rolling with advantage!");
    assert!(lines[10].starts_with("Rolling 2d6: "));
    assert_eq!(lines[11], "You rolled 2 6-sided dice. You now have 12 gold!");
    assert_eq!(lines[12], format!("luck was {}", roll));
}

#[test]
fn same_seed_same_story() {
    let (first, _) = run(ADVENTURE, 1234);
    let (second, _) = run(ADVENTURE, 1234);
    assert_eq!(lines(first), lines(second));
}

#[test]
fn broke_adventurers_cannot_roll() {
    let (interpreter, result) = run("roll 1d20\nscroll still here", 3);
    result.unwrap();

    assert_eq!(interpreter.ledger().gold, 0);
    assert_eq!(interpreter.variable("last_roll"), None);
    assert_eq!(lines(interpreter), vec!["Not Enough gold!", "still here"]);
}

#[test]
fn errors_stop_the_script_where_they_happen() {
    let (interpreter, result) = run("scroll before\nrecruit x = 1 weaken 0\nscroll after", 3);

    let err = result.unwrap_err();
    assert!(matches!(err, QuestError::Evaluation(_)));
    assert!(err.to_string().contains("scripts.qlang:2"));
    assert_eq!(lines(interpreter), vec!["before"]);
}

#[test]
fn unclosed_blocks_are_reported() {
    let (_, result) = run("quest wander() {\nscroll lost", 3);
    assert!(matches!(result.unwrap_err(), QuestError::Syntax(_)));
}
