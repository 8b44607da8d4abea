//! Shared fixture for the in-crate unit tests.

use chrono::Duration;
use tokenclear_ledger::InMemoryLedger;
use tokenclear_types::{
    AccountId, Amount, ClearingError, ClearingId, ClearingIdentifier, ClearingOperation,
    ClearingOperationFrom, ClearingOperationType, EngineConfig, Hold, Partition, Role,
};

use crate::clock::{Clock, ManualClock};
use crate::engine::ClearingEngine;
use crate::guard::InMemoryGuardChain;
use crate::hold_bridge::InMemoryHoldBridge;

pub(crate) type TestEngine =
    ClearingEngine<InMemoryLedger, InMemoryGuardChain, InMemoryHoldBridge, ManualClock>;

pub(crate) struct Fixture {
    pub engine: TestEngine,
    pub clock: ManualClock,
    /// Holds the clearing and adjustment roles.
    pub admin: AccountId,
    pub validator: AccountId,
    pub holder: AccountId,
    pub recipient: AccountId,
}

impl Fixture {
    pub fn with_config(config: EngineConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let clock = ManualClock::default();
        let admin = AccountId::new();
        let validator = AccountId::new();
        let holder = AccountId::new();
        let recipient = AccountId::new();

        let mut guard = InMemoryGuardChain::new();
        guard.onboard(admin, &[Role::Clearing, Role::AdjustmentBalance]);
        guard.onboard(validator, &[Role::ClearingValidator]);
        guard.onboard(holder, &[Role::Clearing]);
        guard.onboard(recipient, &[]);

        let engine = ClearingEngine::new(
            config,
            InMemoryLedger::new(),
            guard,
            InMemoryHoldBridge::new(),
            clock.clone(),
        )
        .expect("valid config");
        Self {
            engine,
            clock,
            admin,
            validator,
            holder,
            recipient,
        }
    }

    /// Single-partition engine with `amount` issued to the holder.
    pub fn funded(amount: Amount) -> Self {
        let mut fx = Self::with_config(EngineConfig::default());
        fx.engine
            .issue(Partition::DEFAULT, fx.holder, amount)
            .expect("issue");
        fx
    }

    /// Default-partition operation expiring in one hour.
    pub fn operation(&self) -> ClearingOperation {
        ClearingOperation {
            partition: Partition::DEFAULT,
            expiration: self.clock.now() + Duration::hours(1),
            data: Vec::new(),
        }
    }

    pub fn operation_from(&self, from: AccountId) -> ClearingOperationFrom {
        ClearingOperationFrom {
            operation: self.operation(),
            from,
            operator_data: Vec::new(),
        }
    }

    pub fn hold(&self, amount: Amount) -> Hold {
        Hold {
            amount,
            expiration: self.clock.now() + Duration::hours(2),
            escrow: AccountId::new(),
            to: Some(self.recipient),
            data: Vec::new(),
        }
    }

    /// Holder → recipient transfer clearing on the default partition.
    pub fn transfer(&mut self, amount: Amount) -> Result<ClearingId, ClearingError> {
        let op = self.operation();
        self.engine
            .clearing_transfer_by_partition(self.holder, op, amount, self.recipient)
    }

    pub fn id(&self, clearing_id: ClearingId, operation_type: ClearingOperationType) -> ClearingIdentifier {
        ClearingIdentifier {
            partition: Partition::DEFAULT,
            token_holder: self.holder,
            clearing_id,
            operation_type,
        }
    }
}
