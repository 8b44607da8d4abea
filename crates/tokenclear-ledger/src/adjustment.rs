//! Balance Adjustment Factor (BAF) registry.
//!
//! Holds the cumulative global factor, optional per-partition factors and a
//! queue of scheduled global adjustments. Applying an adjustment is O(1):
//! no account, clearing or holder is ever visited. Stored amounts catch up
//! lazily when they are next read through [`ScaledAmount::adjusted`].
//!
//! The effective factor of a partition is `global ∘ partition`. Factors are
//! never reset, so a value snapshotted before steps `f1` and `f2` reads as
//! `f1·f2` times its principal; one snapshotted between them reads `f2`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokenclear_types::{
    AdjustmentFactor, AdjustmentStep, Amount, ClearingError, Partition, Result, ScaledAmount,
};

/// Per-ledger registry of cumulative balance adjustment factors.
///
/// One instance per ledger, owned by the engine and mutated only through
/// the adjustment entry points.
#[derive(Debug, Default)]
pub struct BalanceAdjustmentRegistry {
    /// Cumulative factor applied to every partition.
    global: AdjustmentFactor,
    /// Cumulative partition-only factors (absent = identity).
    partitions: HashMap<Partition, AdjustmentFactor>,
    /// Scheduled global steps keyed by (execution time, insertion sequence).
    scheduled: BTreeMap<(DateTime<Utc>, u64), AdjustmentStep>,
    /// Tie-breaker for steps scheduled at the same instant.
    next_sequence: u64,
}

impl BalanceAdjustmentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cumulative global factor.
    #[must_use]
    pub fn global_factor(&self) -> AdjustmentFactor {
        self.global
    }

    /// Effective factor of `partition` from already-applied steps.
    pub fn current_factor(&self, partition: Partition) -> Result<AdjustmentFactor> {
        match self.partitions.get(&partition) {
            Some(local) => self.global.compose(*local),
            None => Ok(self.global),
        }
    }

    /// Factor to freeze into a new record's `creation_factor`.
    pub fn snapshot(&self, partition: Partition) -> Result<AdjustmentFactor> {
        self.current_factor(partition)
    }

    /// Effective factor of `partition` as of `now`, counting scheduled steps
    /// that are due but not yet triggered.
    pub fn factor_at(&self, partition: Partition, now: DateTime<Utc>) -> Result<AdjustmentFactor> {
        self.due_steps(now)
            .try_fold(self.current_factor(partition)?, AdjustmentFactor::apply)
    }

    /// `amount × current / recorded` for `partition`, floor rounded.
    pub fn rescale(
        &self,
        partition: Partition,
        amount: Amount,
        recorded: AdjustmentFactor,
    ) -> Result<Amount> {
        self.current_factor(partition)?.rescale(amount, recorded)
    }

    /// Adjusted value of a stored amount on `partition` as of `now`.
    pub fn adjusted_at(
        &self,
        partition: Partition,
        amount: &ScaledAmount,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        amount.adjusted(self.factor_at(partition, now)?)
    }

    /// Apply a step to every partition. Returns the new global factor.
    pub fn apply_adjustment(&mut self, step: AdjustmentStep) -> Result<AdjustmentFactor> {
        Self::validate(step)?;
        self.global = self.global.apply(step)?;
        tracing::debug!(%step, factor = %self.global, "Global balance adjustment applied");
        Ok(self.global)
    }

    /// Apply a step to one partition only. Returns its new effective factor.
    pub fn apply_partition_adjustment(
        &mut self,
        partition: Partition,
        step: AdjustmentStep,
    ) -> Result<AdjustmentFactor> {
        Self::validate(step)?;
        let local = self
            .partitions
            .get(&partition)
            .copied()
            .unwrap_or_default()
            .apply(step)?;
        let effective = self.global.compose(local)?;
        self.partitions.insert(partition, local);
        tracing::debug!(
            partition = %partition.short(),
            %step,
            factor = %effective,
            "Partition balance adjustment applied"
        );
        Ok(effective)
    }

    /// Queue a global step to take effect at `execution_time`.
    pub fn schedule(&mut self, execution_time: DateTime<Utc>, step: AdjustmentStep) -> Result<()> {
        Self::validate(step)?;
        self.scheduled
            .insert((execution_time, self.next_sequence), step);
        self.next_sequence += 1;
        Ok(())
    }

    /// Scheduled steps due at `now`, oldest first, each paired with the
    /// cumulative global factor after it. Read-only.
    pub fn due_adjustments(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(AdjustmentStep, AdjustmentFactor)>> {
        let mut factor = self.global;
        self.due_steps(now)
            .map(|step| {
                factor = factor.apply(step)?;
                Ok((step, factor))
            })
            .collect()
    }

    /// Fold steps returned by [`Self::due_adjustments`] for the same `now`
    /// into the registry and drop them from the queue.
    pub fn commit_due(&mut self, now: DateTime<Utc>, due: &[(AdjustmentStep, AdjustmentFactor)]) {
        let Some((_, factor)) = due.last() else {
            return;
        };
        self.global = *factor;
        while let Some(entry) = self.scheduled.first_entry() {
            if entry.key().0 > now {
                break;
            }
            entry.remove();
        }
        tracing::info!(
            applied = due.len(),
            factor = %self.global,
            "Scheduled balance adjustments triggered"
        );
    }

    /// Apply every scheduled step due at `now`, oldest first. Returns each
    /// applied step with the global factor after it. The registry is
    /// unchanged if folding them overflows.
    pub fn trigger_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(AdjustmentStep, AdjustmentFactor)>> {
        let due = self.due_adjustments(now)?;
        self.commit_due(now, &due);
        Ok(due)
    }

    /// Scheduled steps not yet triggered, in execution order.
    #[must_use]
    pub fn pending(&self) -> Vec<(DateTime<Utc>, AdjustmentStep)> {
        self.scheduled
            .iter()
            .map(|((at, _), step)| (*at, *step))
            .collect()
    }

    fn due_steps(&self, now: DateTime<Utc>) -> impl Iterator<Item = AdjustmentStep> + '_ {
        self.scheduled
            .range(..=(now, u64::MAX))
            .map(|(_, step)| *step)
    }

    fn validate(step: AdjustmentStep) -> Result<()> {
        if step.factor == 0 {
            return Err(ClearingError::InvalidAdjustmentFactor {
                reason: "factor must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
