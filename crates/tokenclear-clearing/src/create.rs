//! Clearing creation: three caller shapes × three operation kinds.
//!
//! | Shape    | Caller                         | Authorization            |
//! |----------|--------------------------------|--------------------------|
//! | holder   | the token holder               | [`Role::Clearing`]       |
//! | from     | a spender with allowance       | allowance ≥ amount       |
//! | operator | an operator for the holder     | operator on partition    |
//!
//! All nine entry points funnel into one checked path. Checks run in a
//! fixed order and the first failure aborts the call:
//!
//! 1. paused
//! 2. clearing mode
//! 3. shape authorization
//! 4. partition
//! 5. zero addresses
//! 6. zero amount
//! 7. expiration
//! 8. control list, KYC, compliance (holder and receiving account)
//! 9. free balance

use chrono::{DateTime, Utc};
use tokenclear_ledger::Ledger;
use tokenclear_types::{
    AccountId, Amount, ClearingError, ClearingEvent, ClearingHeader, ClearingId, ClearingKind,
    ClearingOperation, ClearingOperationFrom, ClearingRecord, Hold, Result, Role,
};

use crate::clock::Clock;
use crate::engine::ClearingEngine;
use crate::guard::GuardChain;
use crate::hold_bridge::HoldBridge;

/// Who is asking to lock the holder's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallerShape {
    Holder,
    Spender,
    Operator,
}

struct CreateRequest {
    shape: CallerShape,
    operator: AccountId,
    holder: AccountId,
    operation: ClearingOperation,
    operator_data: Vec<u8>,
    amount: Amount,
    kind: ClearingKind,
}

impl CreateRequest {
    fn by_holder(caller: AccountId, operation: ClearingOperation, amount: Amount, kind: ClearingKind) -> Self {
        Self {
            shape: CallerShape::Holder,
            operator: caller,
            holder: caller,
            operation,
            operator_data: Vec::new(),
            amount,
            kind,
        }
    }

    fn delegated(
        shape: CallerShape,
        caller: AccountId,
        operation: ClearingOperationFrom,
        amount: Amount,
        kind: ClearingKind,
    ) -> Self {
        Self {
            shape,
            operator: caller,
            holder: operation.from,
            operation: operation.operation,
            operator_data: operation.operator_data,
            amount,
            kind,
        }
    }
}

impl<L, G, H, C> ClearingEngine<L, G, H, C>
where
    L: Ledger,
    G: GuardChain,
    H: HoldBridge,
    C: Clock,
{
    // -----------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------

    /// Lock `amount` of the caller's tokens for a transfer to `to`.
    pub fn clearing_transfer_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperation,
        amount: Amount,
        to: AccountId,
    ) -> Result<ClearingId> {
        let kind = ClearingKind::Transfer { destination: to };
        self.create(CreateRequest::by_holder(caller, operation, amount, kind))
    }

    /// Lock `amount` of `operation.from`'s tokens, spending the caller's
    /// allowance.
    pub fn clearing_transfer_from_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        amount: Amount,
        to: AccountId,
    ) -> Result<ClearingId> {
        let kind = ClearingKind::Transfer { destination: to };
        self.create(CreateRequest::delegated(CallerShape::Spender, caller, operation, amount, kind))
    }

    pub fn operator_clearing_transfer_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        amount: Amount,
        to: AccountId,
    ) -> Result<ClearingId> {
        let kind = ClearingKind::Transfer { destination: to };
        self.create(CreateRequest::delegated(CallerShape::Operator, caller, operation, amount, kind))
    }

    // -----------------------------------------------------------------
    // Redeem
    // -----------------------------------------------------------------

    /// Lock `amount` of the caller's tokens for burning.
    pub fn clearing_redeem_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperation,
        amount: Amount,
    ) -> Result<ClearingId> {
        self.create(CreateRequest::by_holder(caller, operation, amount, ClearingKind::Redeem))
    }

    pub fn clearing_redeem_from_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        amount: Amount,
    ) -> Result<ClearingId> {
        self.create(CreateRequest::delegated(
            CallerShape::Spender,
            caller,
            operation,
            amount,
            ClearingKind::Redeem,
        ))
    }

    pub fn operator_clearing_redeem_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        amount: Amount,
    ) -> Result<ClearingId> {
        self.create(CreateRequest::delegated(
            CallerShape::Operator,
            caller,
            operation,
            amount,
            ClearingKind::Redeem,
        ))
    }

    // -----------------------------------------------------------------
    // Hold creation
    // -----------------------------------------------------------------

    /// Lock `hold.amount` of the caller's tokens; approval turns them into
    /// an escrow hold.
    pub fn clearing_create_hold_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperation,
        hold: Hold,
    ) -> Result<ClearingId> {
        let amount = hold.amount;
        let kind = ClearingKind::HoldCreation(hold);
        self.create(CreateRequest::by_holder(caller, operation, amount, kind))
    }

    pub fn clearing_create_hold_from_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        hold: Hold,
    ) -> Result<ClearingId> {
        let amount = hold.amount;
        let kind = ClearingKind::HoldCreation(hold);
        self.create(CreateRequest::delegated(CallerShape::Spender, caller, operation, amount, kind))
    }

    pub fn operator_clearing_create_hold_by_partition(
        &mut self,
        caller: AccountId,
        operation: ClearingOperationFrom,
        hold: Hold,
    ) -> Result<ClearingId> {
        let amount = hold.amount;
        let kind = ClearingKind::HoldCreation(hold);
        self.create(CreateRequest::delegated(CallerShape::Operator, caller, operation, amount, kind))
    }

    // -----------------------------------------------------------------
    // Shared path
    // -----------------------------------------------------------------

    fn create(&mut self, request: CreateRequest) -> Result<ClearingId> {
        let CreateRequest {
            shape,
            operator,
            holder,
            operation,
            operator_data,
            amount,
            kind,
        } = request;
        let partition = operation.partition;

        self.guard.check_not_paused()?;
        self.check_active()?;
        match shape {
            CallerShape::Holder => self.guard.check_role(Role::Clearing, operator)?,
            CallerShape::Spender => self.guard.check_allowance(holder, operator, amount)?,
            CallerShape::Operator => self.guard.check_operator(partition, operator, holder)?,
        }
        self.check_partition(partition)?;

        let zero_counterparty = match &kind {
            ClearingKind::Transfer { destination } => destination.is_zero(),
            ClearingKind::Redeem => false,
            ClearingKind::HoldCreation(hold) => hold.escrow.is_zero(),
        };
        if holder.is_zero() || zero_counterparty {
            return Err(ClearingError::ZeroAddressNotAllowed);
        }
        if amount == 0 {
            return Err(ClearingError::ZeroAmount);
        }

        let now = self.clock.now();
        check_expiration(operation.expiration, now)?;
        if let ClearingKind::HoldCreation(hold) = &kind {
            check_expiration(hold.expiration, now)?;
        }

        self.check_parties(partition, holder, &kind, amount)?;

        let factor = self.registry.factor_at(partition, now)?;
        let available = self.ledger.free_balance(partition, holder, factor)?;
        if available < amount {
            return Err(ClearingError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let mut cleared = self.cleared_entry(partition, holder);
        cleared.add(amount, factor)?;
        let due = self.registry.due_adjustments(now)?;

        // Commit.
        if shape == CallerShape::Spender {
            self.guard.spend_allowance(holder, operator, amount)?;
        }
        self.ledger.debit_free(partition, holder, amount, factor)?;
        self.commit_scheduled(operator, now, due);
        self.set_cleared(partition, holder, cleared);

        let clearing_id = self.store.next_id(partition, holder);
        let record = ClearingRecord {
            header: ClearingHeader {
                partition,
                token_holder: holder,
                clearing_id,
                amount,
                expiration: operation.expiration,
                data: operation.data,
                operator_data,
                creation_factor: factor,
            },
            kind,
        };
        let event = creation_event(operator, &record);
        tracing::info!(
            clearing = %record.identifier(),
            operator = %operator,
            amount,
            %factor,
            "Clearing created"
        );
        self.store.put(record)?;
        self.events.push(event);
        Ok(clearing_id)
    }
}

fn check_expiration(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if expiration <= now {
        return Err(ClearingError::WrongExpirationTimestamp { expiration, now });
    }
    Ok(())
}

fn creation_event(operator: AccountId, record: &ClearingRecord) -> ClearingEvent {
    let header = &record.header;
    match &record.kind {
        ClearingKind::Transfer { destination } => ClearingEvent::ClearedTransfer {
            operator,
            token_holder: header.token_holder,
            to: *destination,
            partition: header.partition,
            clearing_id: header.clearing_id,
            amount: header.amount,
            operator_data: header.operator_data.clone(),
        },
        ClearingKind::Redeem => ClearingEvent::ClearedRedeem {
            operator,
            token_holder: header.token_holder,
            partition: header.partition,
            clearing_id: header.clearing_id,
            amount: header.amount,
            operator_data: header.operator_data.clone(),
        },
        ClearingKind::HoldCreation(hold) => ClearingEvent::ClearedHold {
            operator,
            token_holder: header.token_holder,
            to: hold.to,
            partition: header.partition,
            clearing_id: header.clearing_id,
            amount: header.amount,
            operator_data: header.operator_data.clone(),
        },
    }
}
