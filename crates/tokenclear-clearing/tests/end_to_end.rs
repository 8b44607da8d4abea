//! End-to-end clearing lifecycle tests.
//!
//! Exercise the engine through its public surface only: issuance, the nine
//! creation shapes, approval/cancel/reclaim, balance adjustments (immediate
//! and scheduled), guard-chain changes between creation and settlement, and
//! supply conservation after every step.

use chrono::Duration;
use rust_decimal::Decimal;
use tokenclear_clearing::{
    ClearingEngine, Clock, InMemoryGuardChain, InMemoryHoldBridge, ManualClock,
};
use tokenclear_ledger::InMemoryLedger;
use tokenclear_types::*;

type Engine = ClearingEngine<InMemoryLedger, InMemoryGuardChain, InMemoryHoldBridge, ManualClock>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine plus the cast of accounts every scenario needs.
struct Desk {
    engine: Engine,
    clock: ManualClock,
    admin: AccountId,
    validator: AccountId,
    spender: AccountId,
    operator: AccountId,
    alice: AccountId,
    bob: AccountId,
    partition: Partition,
}

impl Desk {
    fn new(config: EngineConfig, partition: Partition) -> Self {
        init_tracing();
        let clock = ManualClock::default();
        let admin = AccountId::new();
        let validator = AccountId::new();
        let spender = AccountId::new();
        let operator = AccountId::new();
        let alice = AccountId::new();
        let bob = AccountId::new();

        let mut guard = InMemoryGuardChain::new();
        guard.onboard(admin, &[Role::Clearing, Role::AdjustmentBalance]);
        guard.onboard(validator, &[Role::ClearingValidator]);
        guard.onboard(alice, &[Role::Clearing]);
        guard.onboard(bob, &[]);
        guard.approve(alice, spender, u128::from(u64::MAX));
        guard.authorize_operator_by_partition(partition, alice, operator);

        let engine = ClearingEngine::new(
            config,
            InMemoryLedger::new(),
            guard,
            InMemoryHoldBridge::new(),
            clock.clone(),
        )
        .unwrap();
        Self {
            engine,
            clock,
            admin,
            validator,
            spender,
            operator,
            alice,
            bob,
            partition,
        }
    }

    fn single() -> Self {
        Self::new(EngineConfig::default(), Partition::DEFAULT)
    }

    fn operation(&self) -> ClearingOperation {
        ClearingOperation {
            partition: self.partition,
            expiration: self.clock.now() + Duration::days(1),
            data: b"clearing".to_vec(),
        }
    }

    fn operation_from(&self) -> ClearingOperationFrom {
        ClearingOperationFrom {
            operation: self.operation(),
            from: self.alice,
            operator_data: b"desk".to_vec(),
        }
    }

    fn hold(&self, amount: Amount) -> Hold {
        Hold {
            amount,
            expiration: self.clock.now() + Duration::days(1),
            escrow: self.admin,
            to: Some(self.bob),
            data: Vec::new(),
        }
    }

    fn ident(&self, clearing_id: ClearingId, operation_type: ClearingOperationType) -> ClearingIdentifier {
        ClearingIdentifier {
            partition: self.partition,
            token_holder: self.alice,
            clearing_id,
            operation_type,
        }
    }

    fn transfer(&mut self, amount: Amount) -> Result<ClearingId> {
        let op = self.operation();
        self.engine
            .clearing_transfer_by_partition(self.alice, op, amount, self.bob)
    }

    fn free(&self, account: AccountId) -> Amount {
        self.engine
            .balance_of_by_partition(self.partition, account)
            .unwrap()
    }

    fn cleared(&self) -> Amount {
        self.engine
            .cleared_amount_for_by_partition(self.partition, self.alice)
            .unwrap()
    }

    fn assert_conserved(&self) {
        self.engine.verify_conservation(self.partition).unwrap();
    }

    /// Try all nine creation shapes, returning each outcome.
    fn create_all_shapes(&mut self, amount: Amount) -> Vec<Result<ClearingId>> {
        let (alice, bob, spender, operator) = (self.alice, self.bob, self.spender, self.operator);
        let op = self.operation();
        let from = self.operation_from();
        let hold = self.hold(amount);
        let e = &mut self.engine;
        vec![
            e.clearing_transfer_by_partition(alice, op.clone(), amount, bob),
            e.clearing_transfer_from_by_partition(spender, from.clone(), amount, bob),
            e.operator_clearing_transfer_by_partition(operator, from.clone(), amount, bob),
            e.clearing_redeem_by_partition(alice, op.clone(), amount),
            e.clearing_redeem_from_by_partition(spender, from.clone(), amount),
            e.operator_clearing_redeem_by_partition(operator, from.clone(), amount),
            e.clearing_create_hold_by_partition(alice, op, hold.clone()),
            e.clearing_create_hold_from_by_partition(spender, from.clone(), hold.clone()),
            e.operator_clearing_create_hold_by_partition(operator, from, hold),
        ]
    }
}

fn split(ratio: Decimal) -> AdjustmentStep {
    AdjustmentStep::from_decimal(ratio).unwrap()
}

// =========================================================================
// Scenario A: create then approve a transfer
// =========================================================================

#[test]
fn transfer_approved() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 3000).unwrap();

    let id = desk.transfer(1000).unwrap();
    assert_eq!(id, ClearingId(1));
    assert_eq!(desk.cleared(), 1000);
    assert_eq!(desk.engine.balance_of(desk.alice).unwrap(), 2000);
    desk.assert_conserved();

    let ident = desk.ident(id, ClearingOperationType::Transfer);
    desk.engine
        .approve_clearing_operation_by_partition(desk.validator, &ident)
        .unwrap();
    assert_eq!(desk.free(desk.bob), 1000);
    assert_eq!(desk.cleared(), 0);
    assert_eq!(desk.free(desk.alice), 2000);
    desk.assert_conserved();

    let events = desk.engine.take_events();
    assert!(matches!(
        &events[..],
        [
            ClearingEvent::ClearedTransfer { amount: 1000, .. },
            ClearingEvent::ClearingResolved {
                outcome: ClearingOutcome::Settled,
                amount: 1000,
                ..
            },
        ]
    ));
}

// =========================================================================
// Scenario B: reclaim after expiry
// =========================================================================

#[test]
fn transfer_reclaimed_after_expiry() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 3000).unwrap();
    let id = desk.transfer(1000).unwrap();
    let ident = desk.ident(id, ClearingOperationType::Transfer);

    desk.clock.advance(Duration::days(1) + Duration::seconds(1));
    let refund = desk
        .engine
        .reclaim_clearing_operation_by_partition(desk.validator, &ident)
        .unwrap();
    assert_eq!(refund, 1000);
    assert_eq!(desk.free(desk.alice), 3000);
    assert_eq!(desk.free(desk.bob), 0);
    assert_eq!(desk.cleared(), 0);
    desk.assert_conserved();
}

// =========================================================================
// Scenario C: compounding scheduled adjustments
// =========================================================================

#[test]
fn scheduled_adjustments_compound_on_pending_clearings() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 5000).unwrap();
    for expected in 1..=3 {
        assert_eq!(desk.transfer(1000).unwrap(), ClearingId(expected));
    }
    assert_eq!(desk.cleared(), 3000);

    let now = desk.clock.now();
    let factor = split(Decimal::new(253, 2));
    desk.engine
        .schedule_balance_adjustment(desk.admin, now + Duration::hours(1), factor)
        .unwrap();
    desk.engine
        .schedule_balance_adjustment(desk.admin, now + Duration::hours(2), factor)
        .unwrap();
    desk.clock.advance(Duration::hours(3));

    // Both steps are due; reads see them before any write triggers them.
    let squared: Amount = 253 * 253;
    assert_eq!(desk.cleared(), 3000 * squared);
    assert_eq!(desk.free(desk.alice), 2000 * squared);
    assert_eq!(desk.engine.decimals(desk.partition).unwrap(), 6 + 4);
    assert_eq!(desk.engine.pending_adjustments().len(), 2);
    desk.assert_conserved();

    // In display units: 3000 base units × 2.53².
    let ratio = Decimal::new(253, 2);
    let expected = Decimal::from(3000) * ratio * ratio / Decimal::from(1_000_000);
    assert_eq!(
        desk.engine
            .display_amount(desk.partition, desk.cleared())
            .unwrap(),
        expected
    );

    // Records keep their creation-time principal; reads rescale it.
    let ident = desk.ident(ClearingId(2), ClearingOperationType::Transfer);
    let stored = desk
        .engine
        .clearing_for_by_partition_unadjusted(&ident)
        .unwrap();
    assert_eq!(stored.header.amount, 1000);
    assert_eq!(
        desk.engine
            .clearing_for_by_partition(&ident)
            .unwrap()
            .header
            .amount,
        1000 * squared
    );
    assert_eq!(
        desk.engine
            .cleared_amount_for_by_partition_unadjusted(desk.partition, desk.alice),
        3000
    );

    // Settling triggers the schedule and moves the rescaled principal.
    desk.engine
        .approve_clearing_operation_by_partition(desk.validator, &ident)
        .unwrap();
    assert!(desk.engine.pending_adjustments().is_empty());
    assert_eq!(desk.free(desk.bob), 1000 * squared);
    assert_eq!(desk.cleared(), 2000 * squared);
    desk.assert_conserved();
}

#[test]
fn adjustment_between_clearings_scales_only_earlier_ones() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 10_000).unwrap();
    let before = desk.transfer(1000).unwrap();
    desk.engine
        .adjust_balances(desk.admin, AdjustmentStep::new(2, 0).unwrap())
        .unwrap();
    let between = desk.transfer(1000).unwrap();
    desk.engine
        .adjust_balances(desk.admin, AdjustmentStep::new(3, 0).unwrap())
        .unwrap();

    let read = |id| {
        desk.engine
            .clearing_for_by_partition(&desk.ident(id, ClearingOperationType::Transfer))
            .unwrap()
            .header
            .amount
    };
    assert_eq!(read(before), 6000);
    assert_eq!(read(between), 3000);
    assert_eq!(desk.cleared(), 9000);
    desk.assert_conserved();
}

// =========================================================================
// Scenario D: clearing mode
// =========================================================================

#[test]
fn disabled_mode_rejects_every_shape() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 9000).unwrap();
    desk.engine.deactivate_clearing(desk.admin).unwrap();

    let results = desk.create_all_shapes(100);
    assert_eq!(results.len(), 9);
    for result in results {
        assert_eq!(result.unwrap_err(), ClearingError::ClearingIsDisabled);
    }
    assert_eq!(desk.free(desk.alice), 9000);

    desk.engine.activate_clearing(desk.admin).unwrap();
    let ids: Vec<_> = desk
        .create_all_shapes(100)
        .into_iter()
        .map(|result| result.unwrap())
        .collect();
    assert_eq!(ids, (1..=9).map(ClearingId).collect::<Vec<_>>());
    assert_eq!(desk.cleared(), 900);
    assert_eq!(desk.free(desk.alice), 8100);
    for kind in ClearingOperationType::ALL {
        assert_eq!(
            desk.engine
                .clearing_count_for_by_partition(desk.partition, desk.alice, kind),
            3
        );
    }
    desk.assert_conserved();
}

// =========================================================================
// Scenario E: guard chain re-evaluated at approval
// =========================================================================

#[test]
fn approval_rechecks_destination_kyc() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 500).unwrap();
    let id = desk.transfer(200).unwrap();
    let ident = desk.ident(id, ClearingOperationType::Transfer);

    desk.engine.guard_mut().revoke_kyc(desk.bob);
    let err = desk
        .engine
        .approve_clearing_operation_by_partition(desk.validator, &ident)
        .unwrap_err();
    assert_eq!(err, ClearingError::InvalidKycStatus(desk.bob));
    assert_eq!(desk.cleared(), 200);
    assert_eq!(desk.free(desk.bob), 0);
    assert!(desk.engine.clearing_for_by_partition(&ident).is_ok());

    desk.engine.guard_mut().grant_kyc(desk.bob);
    desk.engine
        .approve_clearing_operation_by_partition(desk.validator, &ident)
        .unwrap();
    assert_eq!(desk.free(desk.bob), 200);
    desk.assert_conserved();
}

// =========================================================================
// Lifecycle properties
// =========================================================================

#[test]
fn cancel_round_trip_restores_state() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 1000).unwrap();
    let before = desk.engine.partition_balance(desk.partition, desk.alice).unwrap();

    let ids = desk.create_all_shapes(50);
    for (n, result) in ids.into_iter().enumerate() {
        let id = result.unwrap();
        let kind = ClearingOperationType::ALL[n / 3];
        let refund = desk
            .engine
            .cancel_clearing_operation_by_partition(desk.validator, &desk.ident(id, kind))
            .unwrap();
        assert_eq!(refund, 50);
    }

    let after = desk.engine.partition_balance(desk.partition, desk.alice).unwrap();
    assert_eq!(before, after);
    assert_eq!(desk.engine.pending_count(), 0);
    desk.assert_conserved();
}

#[test]
fn create_hold_and_redeem_from_operator_and_spender() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 1000).unwrap();

    let from = desk.operation_from();
    let hold = desk.hold(300);
    let hold_clearing = desk
        .engine
        .operator_clearing_create_hold_by_partition(desk.operator, from.clone(), hold)
        .unwrap();
    let redeem_clearing = desk
        .engine
        .clearing_redeem_from_by_partition(desk.spender, from, 200)
        .unwrap();

    let hold_id = desk
        .engine
        .approve_clearing_operation_by_partition(
            desk.validator,
            &desk.ident(hold_clearing, ClearingOperationType::HoldCreation),
        )
        .unwrap();
    desk.engine
        .approve_clearing_operation_by_partition(
            desk.validator,
            &desk.ident(redeem_clearing, ClearingOperationType::Redeem),
        )
        .unwrap();

    let balance = desk.engine.partition_balance(desk.partition, desk.alice).unwrap();
    assert_eq!(balance.free, 500);
    assert_eq!(balance.held, 300);
    assert_eq!(balance.cleared, 0);
    assert_eq!(desk.engine.total_supply_by_partition(desk.partition).unwrap(), 800);

    let stored = desk
        .engine
        .holds()
        .get(desk.partition, desk.alice, hold_id.unwrap())
        .unwrap();
    assert_eq!(stored.hold.to, Some(desk.bob));
    desk.assert_conserved();
}

#[test]
fn paging_and_swap_removal() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 100).unwrap();
    for _ in 0..5 {
        desk.transfer(1).unwrap();
    }
    let t = ClearingOperationType::Transfer;
    let page = desk
        .engine
        .clearings_id_for_by_partition(desk.partition, desk.alice, t, 0, 3);
    assert_eq!(page, vec![ClearingId(1), ClearingId(2), ClearingId(3)]);

    desk.engine
        .cancel_clearing_operation_by_partition(desk.validator, &desk.ident(ClearingId(2), t))
        .unwrap();
    let mut all = desk
        .engine
        .clearings_id_for_by_partition(desk.partition, desk.alice, t, 0, 100);
    all.sort();
    assert_eq!(all, vec![ClearingId(1), ClearingId(3), ClearingId(4), ClearingId(5)]);
    assert_eq!(desk.engine.clearing_count_for_by_partition(desk.partition, desk.alice, t), 4);
}

#[test]
fn multi_partition_adjustment_and_account_wide_cleared() {
    let bonds = Partition::from_label("bonds");
    let mut desk = Desk::new(EngineConfig::multi_partition(), bonds);
    desk.engine.issue(bonds, desk.alice, 1000).unwrap();
    desk.engine.issue(Partition::DEFAULT, desk.alice, 1000).unwrap();

    desk.transfer(100).unwrap();
    let default_op = ClearingOperation {
        partition: Partition::DEFAULT,
        ..desk.operation()
    };
    desk.engine
        .clearing_redeem_by_partition(desk.alice, default_op, 100)
        .unwrap();

    desk.engine
        .adjust_balances_by_partition(desk.admin, bonds, AdjustmentStep::new(4, 0).unwrap())
        .unwrap();
    assert_eq!(desk.cleared(), 400);
    assert_eq!(desk.engine.cleared_amount_for(desk.alice).unwrap(), 500);
    assert_eq!(desk.engine.cleared_amount_for_unadjusted(desk.alice).unwrap(), 200);
    assert_eq!(desk.engine.balance_of(desk.alice).unwrap(), 3600 + 900);
    desk.engine.verify_conservation(bonds).unwrap();
    desk.engine.verify_conservation(Partition::DEFAULT).unwrap();
}

#[test]
fn paused_token_blocks_everything() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 100).unwrap();
    let id = desk.transfer(10).unwrap();
    let ident = desk.ident(id, ClearingOperationType::Transfer);
    desk.engine.guard_mut().set_paused(true);

    assert_eq!(desk.transfer(10).unwrap_err(), ClearingError::TokenIsPaused);
    for result in [
        desk.engine
            .approve_clearing_operation_by_partition(desk.validator, &ident)
            .map(|_| ()),
        desk.engine
            .cancel_clearing_operation_by_partition(desk.validator, &ident)
            .map(|_| ()),
        desk.engine
            .adjust_balances(desk.admin, AdjustmentStep::new(2, 0).unwrap())
            .map(|_| ()),
    ] {
        assert_eq!(result.unwrap_err(), ClearingError::TokenIsPaused);
    }

    desk.engine.guard_mut().set_paused(false);
    assert!(desk
        .engine
        .cancel_clearing_operation_by_partition(desk.validator, &ident)
        .is_ok());
}

#[test]
fn events_serialize_for_audit() {
    let mut desk = Desk::single();
    desk.engine.issue(desk.partition, desk.alice, 100).unwrap();
    desk.transfer(10).unwrap();
    for event in desk.engine.take_events() {
        let json = serde_json::to_string(&event).unwrap();
        let back: ClearingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
