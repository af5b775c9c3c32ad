//! # Height Strategies
//!
//! A height strategy answers "how high is the water at this instant?" from a
//! [`TideView`], or declines with `None` when the data it needs is missing or
//! unusable. Strategies are tried in order by a [`StrategyChain`]; the first
//! answer wins. The dense interpolator chains cubic then linear, and the
//! estimator chains the dense interpolator then the extrema model.

use crate::TideView;
use chrono::{DateTime, Utc};
use tracing::debug;

/// One way of estimating the tide height at an instant.
pub trait HeightStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Height at `target`, or `None` if this strategy cannot answer.
    fn estimate_height(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64>;
}

/// A height together with the strategy that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub height: f64,
    pub strategy: &'static str,
}

/// Ordered list of strategies, tried front to back.
#[derive(Default)]
pub struct StrategyChain {
    strategies: Vec<Box<dyn HeightStrategy>>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy to the end of the chain.
    pub fn with(mut self, strategy: impl HeightStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies, in the order they are tried.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First successful estimate.
    ///
    /// Non-finite heights are treated as a failure of that strategy.
    pub fn estimate(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<Estimate> {
        for strategy in &self.strategies {
            match strategy.estimate_height(view, target) {
                Some(height) if height.is_finite() => {
                    return Some(Estimate {
                        height,
                        strategy: strategy.name(),
                    })
                }
                Some(height) => {
                    debug!(strategy = strategy.name(), height, "discarding non-finite height");
                }
                None => {
                    debug!(strategy = strategy.name(), "strategy declined, trying next");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Option<f64>);

    impl HeightStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn estimate_height(&self, _view: TideView<'_>, _target: DateTime<Utc>) -> Option<f64> {
            self.1
        }
    }

    #[test]
    fn first_answer_wins() {
        let chain = StrategyChain::new()
            .with(Fixed("none", None))
            .with(Fixed("nan", Some(f64::NAN)))
            .with(Fixed("second", Some(1.5)))
            .with(Fixed("third", Some(9.0)));

        let estimate = chain.estimate(TideView::default(), Utc::now()).unwrap();
        assert_eq!(estimate.height, 1.5);
        assert_eq!(estimate.strategy, "second");
        assert_eq!(chain.names(), vec!["none", "nan", "second", "third"]);
    }

    #[test]
    fn empty_chain_has_no_answer() {
        assert!(StrategyChain::new()
            .estimate(TideView::default(), Utc::now())
            .is_none());
    }
}
