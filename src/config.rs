use std::path::{Path, PathBuf};
use std::env;
use std::fs;
use std::io;
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` range of gold handed out as a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRange(pub i64, pub i64);

impl RewardRange {
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let (low, high) = if self.0 <= self.1 {
            (self.0, self.1)
        } else {
            (self.1, self.0)
        };
        rng.random_range(low..=high)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    pub recruit: RewardRange,
    pub sidequest: RewardRange,
    pub quest: RewardRange,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            recruit: RewardRange(1, 2),
            sidequest: RewardRange(1, 10),
            quest: RewardRange(15, 30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env_name: String,
    pub rewards: Rewards,
    /// Gold paid for `gold.adv()` or `gold.disadv()`.
    pub edge_cost: i64,
    pub max_iterations: usize,
    pub max_call_depth: usize,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            env_name: Self::env_name(),
            rewards: Rewards::default(),
            edge_cost: 10,
            max_iterations: 100_000,
            max_call_depth: 64,
            seed: None,
        }
    }
}

impl Config {
    /// Loads the config for the current environment, writing the defaults on first use.
    pub fn load() -> Self {
        let config_path = Self::get_config_path();
        if !config_path.exists() {
            let config = Config::default();
            if let Err(err) = config.save() {
                warn!("Could not write default config to {}: {}", config_path.display(), err);
            }
            return config.with_env_overrides();
        }

        let config = match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring unreadable config {}: {}", config_path.display(), err);
                Config::default()
            }
        };

        config.with_env_overrides()
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// `QLANG_SEED` wins over the seed stored in the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(seed) = env::var("QLANG_SEED") {
            match seed.trim().parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn!("QLANG_SEED={} is not a valid seed, ignoring it", seed),
            }
        }
        self
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
    }

    fn env_name() -> String {
        env::var("QLANG_ENV").unwrap_or_else(|_| String::from("default"))
    }

    pub fn get_config_path() -> PathBuf {
        let home = if cfg!(windows) {
            env::var("USERPROFILE")
        } else {
            env::var("HOME")
        };

        PathBuf::from(home.unwrap_or_else(|_| String::from(".")))
            .join(".qlang")
            .join(Self::env_name())
            .join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn defaults_match_the_classic_rules() {
        let config = Config::default();
        assert_eq!(config.rewards.recruit, RewardRange(1, 2));
        assert_eq!(config.rewards.sidequest, RewardRange(1, 10));
        assert_eq!(config.rewards.quest, RewardRange(15, 30));
        assert_eq!(config.edge_cost, 10);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let json = r#"{ "edge_cost": 3, "rewards": { "quest": [1, 1] } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.edge_cost, 3);
        assert_eq!(config.rewards.quest, RewardRange(1, 1));
        assert_eq!(config.rewards.sidequest, RewardRange(1, 10));
        assert_eq!(config.max_call_depth, 64);
    }

    #[test]
    fn round_trips_through_a_file() {
        let path = env::temp_dir()
            .join(format!("qlang-config-test-{}", std::process::id()))
            .join("config.json");

        let config = Config {
            seed: Some(99),
            edge_cost: 4,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.seed, Some(99));
        assert_eq!(loaded.edge_cost, 4);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn reward_ranges_are_inclusive_and_order_free() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let amount = RewardRange(4, 2).draw(&mut rng);
            assert!((2..=4).contains(&amount));
        }
        assert_eq!(RewardRange(7, 7).draw(&mut rng), 7);
    }
}
