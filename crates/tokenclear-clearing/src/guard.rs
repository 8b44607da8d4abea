//! Guard chain: authorization and compliance checks.
//!
//! The engine consults the guard chain before every state change and
//! consults it again at settlement, so an account blocked or KYC-revoked
//! after creation cannot receive the tokens.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: any failed check aborts the whole call
//! - **Pause first**: [`GuardChain::check_not_paused`] runs before every other check
//! - **Pluggable**: hosts wire in their identity/compliance backends through
//!   the [`GuardChain`] trait; [`InMemoryGuardChain`] serves tests and
//!   embedded deployments

use std::collections::{HashMap, HashSet};

use tokenclear_types::{AccountId, Amount, ClearingError, Partition, Result, Role};

/// External checks consumed by the clearing engine.
///
/// Every `check_*` method is read-only. The only mutation is
/// [`GuardChain::spend_allowance`], which the engine calls after every
/// check of the call has passed.
pub trait GuardChain {
    /// # Errors
    /// [`ClearingError::TokenIsPaused`]
    fn check_not_paused(&self) -> Result<()>;

    /// # Errors
    /// [`ClearingError::AccountHasNoRole`]
    fn check_role(&self, role: Role, account: AccountId) -> Result<()>;

    /// # Errors
    /// [`ClearingError::InvalidKycStatus`]
    fn check_kyc(&self, account: AccountId) -> Result<()>;

    /// # Errors
    /// [`ClearingError::AccountIsBlocked`]
    fn check_not_control_listed(&self, account: AccountId) -> Result<()>;

    /// Would a free movement of `amount` from `from` to `to` (burn when `to`
    /// is `None`) be allowed?
    ///
    /// # Errors
    /// [`ClearingError::ComplianceNotAllowed`]
    fn check_compliance(
        &self,
        partition: Partition,
        from: AccountId,
        to: Option<AccountId>,
        amount: Amount,
    ) -> Result<()>;

    /// # Errors
    /// [`ClearingError::InsufficientAllowance`]
    fn check_allowance(&self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<()>;

    /// Consume allowance previously validated by [`GuardChain::check_allowance`].
    fn spend_allowance(&mut self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<()>;

    /// # Errors
    /// [`ClearingError::Unauthorized`]
    fn check_operator(&self, partition: Partition, operator: AccountId, holder: AccountId) -> Result<()>;
}

/// Control list semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlListMode {
    /// Listed accounts are blocked.
    #[default]
    Blacklist,
    /// Only listed accounts are allowed.
    Whitelist,
}

/// In-memory guard chain.
#[derive(Debug, Default)]
pub struct InMemoryGuardChain {
    paused: bool,
    roles: HashSet<(Role, AccountId)>,
    kyc: HashSet<AccountId>,
    control_list_mode: ControlListMode,
    control_list: HashSet<AccountId>,
    /// Accounts the compliance oracle refuses as sender or receiver.
    compliance_denied: HashSet<AccountId>,
    /// (holder, operator) authorized on every partition.
    operators: HashSet<(AccountId, AccountId)>,
    /// (partition, holder, operator) authorized on one partition.
    partition_operators: HashSet<(Partition, AccountId, AccountId)>,
    /// (owner, spender) → remaining allowance.
    allowances: HashMap<(AccountId, AccountId), Amount>,
}

impl InMemoryGuardChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn grant_role(&mut self, role: Role, account: AccountId) {
        self.roles.insert((role, account));
    }

    pub fn revoke_role(&mut self, role: Role, account: AccountId) {
        self.roles.remove(&(role, account));
    }

    pub fn grant_kyc(&mut self, account: AccountId) {
        self.kyc.insert(account);
    }

    pub fn revoke_kyc(&mut self, account: AccountId) {
        self.kyc.remove(&account);
    }

    pub fn set_control_list_mode(&mut self, mode: ControlListMode) {
        self.control_list_mode = mode;
    }

    pub fn add_to_control_list(&mut self, account: AccountId) {
        self.control_list.insert(account);
    }

    pub fn remove_from_control_list(&mut self, account: AccountId) {
        self.control_list.remove(&account);
    }

    pub fn deny_compliance(&mut self, account: AccountId) {
        self.compliance_denied.insert(account);
    }

    pub fn allow_compliance(&mut self, account: AccountId) {
        self.compliance_denied.remove(&account);
    }

    /// Authorize `operator` for `holder` on every partition.
    pub fn authorize_operator(&mut self, holder: AccountId, operator: AccountId) {
        self.operators.insert((holder, operator));
    }

    /// Authorize `operator` for `holder` on one partition.
    pub fn authorize_operator_by_partition(
        &mut self,
        partition: Partition,
        holder: AccountId,
        operator: AccountId,
    ) {
        self.partition_operators.insert((partition, holder, operator));
    }

    pub fn revoke_operator(&mut self, holder: AccountId, operator: AccountId) {
        self.operators.remove(&(holder, operator));
        self.partition_operators
            .retain(|(_, h, o)| !(*h == holder && *o == operator));
    }

    /// Set (overwrite) the allowance `owner` grants `spender`.
    pub fn approve(&mut self, owner: AccountId, spender: AccountId, amount: Amount) {
        self.allowances.insert((owner, spender), amount);
    }

    #[must_use]
    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Grant KYC and a role in one call; handy for test setup.
    pub fn onboard(&mut self, account: AccountId, roles: &[Role]) {
        self.grant_kyc(account);
        for role in roles {
            self.grant_role(*role, account);
        }
    }
}

impl GuardChain for InMemoryGuardChain {
    fn check_not_paused(&self) -> Result<()> {
        if self.paused {
            return Err(ClearingError::TokenIsPaused);
        }
        Ok(())
    }

    fn check_role(&self, role: Role, account: AccountId) -> Result<()> {
        if self.roles.contains(&(role, account)) {
            Ok(())
        } else {
            Err(ClearingError::AccountHasNoRole { account, role })
        }
    }

    fn check_kyc(&self, account: AccountId) -> Result<()> {
        if self.kyc.contains(&account) {
            Ok(())
        } else {
            Err(ClearingError::InvalidKycStatus(account))
        }
    }

    fn check_not_control_listed(&self, account: AccountId) -> Result<()> {
        let listed = self.control_list.contains(&account);
        let blocked = match self.control_list_mode {
            ControlListMode::Blacklist => listed,
            ControlListMode::Whitelist => !listed,
        };
        if blocked {
            return Err(ClearingError::AccountIsBlocked(account));
        }
        Ok(())
    }

    fn check_compliance(
        &self,
        partition: Partition,
        from: AccountId,
        to: Option<AccountId>,
        amount: Amount,
    ) -> Result<()> {
        let denied = std::iter::once(from)
            .chain(to)
            .find(|account| self.compliance_denied.contains(account));
        if let Some(account) = denied {
            return Err(ClearingError::ComplianceNotAllowed {
                reason: format!(
                    "movement of {amount} on {} refused for {account}",
                    partition.short()
                ),
            });
        }
        Ok(())
    }

    fn check_allowance(&self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<()> {
        let available = self.allowance(owner, spender);
        if available < amount {
            return Err(ClearingError::InsufficientAllowance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn spend_allowance(&mut self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<()> {
        self.check_allowance(owner, spender, amount)?;
        let remaining = self.allowance(owner, spender) - amount;
        self.allowances.insert((owner, spender), remaining);
        Ok(())
    }

    fn check_operator(&self, partition: Partition, operator: AccountId, holder: AccountId) -> Result<()> {
        if self.operators.contains(&(holder, operator))
            || self.partition_operators.contains(&(partition, holder, operator))
        {
            return Ok(());
        }
        Err(ClearingError::Unauthorized { operator, holder })
    }
}
