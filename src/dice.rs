use rand::Rng;

/// Which way a roll leans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Plain,
    Advantage,
    Disadvantage,
}

impl Edge {
    /// Advantage wins when both flags are set.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Self {
        if advantage {
            Edge::Advantage
        } else if disadvantage {
            Edge::Disadvantage
        } else {
            Edge::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub count: i64,
    pub sides: i64,
    pub edge: Edge,
    /// Every full sum drawn: one for a plain roll, two with an edge.
    pub sums: Vec<i64>,
    pub total: i64,
}

/// Sum of `count` uniform draws from `1..=sides`. `sides` must be positive.
pub fn roll_sum<R: Rng + ?Sized>(rng: &mut R, count: i64, sides: i64) -> i64 {
    (0..count).map(|_| rng.random_range(1..=sides)).sum()
}

pub fn roll<R: Rng + ?Sized>(
    rng: &mut R,
    count: i64,
    sides: i64,
    advantage: bool,
    disadvantage: bool,
) -> RollOutcome {
    let edge = Edge::from_flags(advantage, disadvantage);

    let (sums, total) = match edge {
        Edge::Plain => {
            let sum = roll_sum(rng, count, sides);
            (vec![sum], sum)
        }
        Edge::Advantage | Edge::Disadvantage => {
            let first = roll_sum(rng, count, sides);
            let second = roll_sum(rng, count, sides);
            let total = if edge == Edge::Advantage {
                first.max(second)
            } else {
                first.min(second)
            };
            (vec![first, second], total)
        }
    };

    RollOutcome {
        count,
        sides,
        edge,
        sums,
        total,
    }
}

/// The gold balance and the one-shot roll modifiers bought with it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub gold: i64,
    pub advantage: bool,
    pub disadvantage: bool,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn earn(&mut self, amount: i64) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Buying an edge never checks the balance, so gold can go negative here.
    pub fn buy_edge(&mut self, edge: Edge, cost: i64) {
        self.gold = self.gold.saturating_sub(cost);
        match edge {
            Edge::Advantage => self.advantage = true,
            Edge::Disadvantage => self.disadvantage = true,
            Edge::Plain => {}
        }
    }

    pub fn roll_cost(count: i64, sides: i64) -> Option<i64> {
        count.checked_mul(sides)
    }

    pub fn can_afford(&self, count: i64, sides: i64) -> bool {
        Self::roll_cost(count, sides).is_some_and(|cost| cost <= self.gold)
    }

    /// Pays for and performs a roll. Returns `None` when the roll is refused.
    /// Both edge flags are spent either way.
    pub fn try_roll<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        count: i64,
        sides: i64,
    ) -> Option<RollOutcome> {
        let advantage = std::mem::take(&mut self.advantage);
        let disadvantage = std::mem::take(&mut self.disadvantage);

        if !self.can_afford(count, sides) {
            return None;
        }
        self.gold -= count * sides;

        Some(roll(rng, count, sides, advantage, disadvantage))
    }
}
