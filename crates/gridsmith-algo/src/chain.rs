//! Strategy chains: try providers in order, fall back to a local computation.
//!
//! A chain owns:
//! 1. An ordered list of named strategies, each a fallible function of the input
//! 2. A structural validator applied to every strategy output
//! 3. A mandatory local fallback, run only when no strategy produced a valid output
//!
//! Strategy errors and rejected outputs are logged and never surface to the
//! caller. Only the fallback's own error (an input problem) is returned.

use gridsmith_core::GridResult;
use tracing::{debug, warn};

use crate::provider::ProviderError;

type StrategyFn<'a, I, O> = Box<dyn Fn(&I) -> anyhow::Result<O> + 'a>;
type ValidatorFn<'a, I, O> = Box<dyn Fn(&O, &I) -> bool + 'a>;
type FallbackFn<'a, I, O> = Box<dyn Fn(&I) -> GridResult<O> + 'a>;

/// A strategy that was tried and did not produce the result.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

/// Output of a chain together with the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Resolved<O> {
    pub value: O,
    pub source: String,
    pub failures: Vec<StrategyFailure>,
}

impl<O> Resolved<O> {
    pub fn map<U>(self, f: impl FnOnce(O) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            source: self.source,
            failures: self.failures,
        }
    }
}

pub struct StrategyChain<'a, I: ?Sized, O> {
    operation: String,
    strategies: Vec<(String, StrategyFn<'a, I, O>)>,
    validator: ValidatorFn<'a, I, O>,
    fallback_id: String,
    fallback: FallbackFn<'a, I, O>,
}

impl<'a, I: ?Sized, O> StrategyChain<'a, I, O> {
    /// Create a chain whose last resort is `fallback`.
    pub fn new(
        operation: &str,
        fallback_id: &str,
        fallback: impl Fn(&I) -> GridResult<O> + 'a,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            strategies: Vec::new(),
            validator: Box::new(|_, _| true),
            fallback_id: fallback_id.to_string(),
            fallback: Box::new(fallback),
        }
    }

    /// Append a strategy behind the ones already added.
    pub fn strategy(mut self, id: &str, run: impl Fn(&I) -> anyhow::Result<O> + 'a) -> Self {
        self.strategies.push((id.to_string(), Box::new(run)));
        self
    }

    /// Structural check applied to every strategy output (not to the fallback).
    pub fn validate(mut self, check: impl Fn(&O, &I) -> bool + 'a) -> Self {
        self.validator = Box::new(check);
        self
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn run(&self, input: &I) -> GridResult<Resolved<O>> {
        let mut failures = Vec::new();

        for (id, strategy) in &self.strategies {
            debug!(operation = %self.operation, strategy = %id, "trying strategy");
            let reason = match strategy(input) {
                Ok(value) if (self.validator)(&value, input) => {
                    debug!(operation = %self.operation, strategy = %id, "strategy succeeded");
                    return Ok(Resolved {
                        value,
                        source: id.clone(),
                        failures,
                    });
                }
                Ok(_) => {
                    warn!(
                        operation = %self.operation,
                        strategy = %id,
                        "strategy output failed structural check, trying next"
                    );
                    "output failed structural check".to_string()
                }
                Err(err) => {
                    if let Some(ProviderError::Unsupported(_)) = err.downcast_ref::<ProviderError>() {
                        debug!(operation = %self.operation, strategy = %id, "not supported");
                    } else {
                        warn!(
                            operation = %self.operation,
                            strategy = %id,
                            error = %err,
                            "strategy failed, trying next"
                        );
                    }
                    err.to_string()
                }
            };
            failures.push(StrategyFailure {
                strategy: id.clone(),
                reason,
            });
        }

        debug!(operation = %self.operation, fallback = %self.fallback_id, "using local fallback");
        let value = (self.fallback)(input)?;
        Ok(Resolved {
            value,
            source: self.fallback_id.clone(),
            failures,
        })
    }
}
