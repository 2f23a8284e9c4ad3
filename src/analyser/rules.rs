//! Detection rules: which next request may extend a chain of keystroke requests.
//!
//! Each rule models how one search front-end grows its suggestion request as the user types.
use std::collections::BTreeMap;

/// Admissibility predicate over a chain that is already accepted.
pub trait DetectionRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// May `candidate` (sent at `candidate_time`) follow `accepted`?
    ///
    /// `accepted` is never empty. `chain_start_time` is the time of its first element,
    /// `last_accepted_time` the time of its last.
    fn accept(
        &self,
        accepted: &[i64],
        candidate: i64,
        chain_start_time: f64,
        candidate_time: f64,
        last_accepted_time: f64,
    ) -> bool;

    /// Number of leading elements of a selected chain to keep.
    fn trim_tail(&self, lengths: &[i64]) -> usize {
        lengths.len()
    }
}

/// Google suggestions: each typed character adds one to three bytes to the request.
pub struct GoogleRule;

impl GoogleRule {
    const START_WINDOW_MS: f64 = 2500.0;
    const MAX_GAP_MS: f64 = 3000.0;
    /// Request size difference at which the client switches to its long-form request.
    const LONG_FORM_OFFSET: i64 = 8 + 1;
    const LONG_FORM_TOLERANCE: i64 = 5;
    const JUMP: i64 = 4;
}

impl DetectionRule for GoogleRule {
    fn name(&self) -> &'static str {
        "google"
    }

    fn accept(
        &self,
        accepted: &[i64],
        candidate: i64,
        chain_start_time: f64,
        candidate_time: f64,
        last_accepted_time: f64,
    ) -> bool {
        let (Some(&first), Some(&last)) = (accepted.first(), accepted.last()) else {
            return false;
        };
        let d = candidate - last;

        if accepted.len() <= 2 && candidate_time - chain_start_time > Self::START_WINDOW_MS {
            return false;
        }
        if candidate_time - last_accepted_time > Self::MAX_GAP_MS {
            return false;
        }

        match d {
            // No two zero steps in a row.
            0 => !matches!(accepted, [.., a, b] if a == b),
            1..=3 => true,
            d if d > Self::JUMP => {
                let expected = (last - first) + Self::LONG_FORM_OFFSET;
                let close = expected - Self::LONG_FORM_TOLERANCE < d
                    && d < expected + Self::LONG_FORM_TOLERANCE;
                close
                    && accepted.len() >= 5
                    && !accepted.windows(2).any(|w| w[1] - w[0] >= Self::JUMP)
            }
            _ => false,
        }
    }

    /// A final jump of four or more is the page transition after Enter, not a keystroke.
    fn trim_tail(&self, lengths: &[i64]) -> usize {
        match lengths {
            [.., before, last] if last - before >= Self::JUMP => lengths.len() - 1,
            _ => lengths.len(),
        }
    }
}

/// Baidu suggestions: every keystroke grows the request by 2..=30 bytes.
pub struct BaiduRule;

impl BaiduRule {
    const START_WINDOW_MS: f64 = 2000.0;
}

impl DetectionRule for BaiduRule {
    fn name(&self) -> &'static str {
        "baidu"
    }

    fn accept(
        &self,
        accepted: &[i64],
        candidate: i64,
        chain_start_time: f64,
        candidate_time: f64,
        _last_accepted_time: f64,
    ) -> bool {
        let Some(&last) = accepted.last() else {
            return false;
        };
        if accepted.len() <= 2 && candidate_time - chain_start_time > Self::START_WINDOW_MS {
            return false;
        }
        (2..=30).contains(&(candidate - last))
    }
}

/// Named rules, iterated in name order.
pub struct RuleRegistry {
    rules: BTreeMap<&'static str, Box<dyn DetectionRule>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(GoogleRule));
        registry.register(Box::new(BaiduRule));
        registry
    }
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Adds a rule, replacing any rule of the same name.
    pub fn register(&mut self, rule: Box<dyn DetectionRule>) {
        self.rules.insert(rule.name(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&dyn DetectionRule> {
        self.rules.get(name).map(|rule| rule.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DetectionRule> {
        self.rules.values().map(|rule| rule.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.keys().copied().collect()
    }
}
