use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerkit_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Entity, Event, UserId,
    ValueObject,
};

/// Account identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub AggregateId);

impl AccountId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// The person an account belongs to.
///
/// Holders are entities: two holders with the same `user_id` are the same
/// person, whatever the name fields say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolder {
    pub first_name: String,
    pub last_name: String,
    pub user_id: UserId,
}

impl AccountHolder {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        user_id: UserId,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            user_id,
        }
    }
}

impl Entity for AccountHolder {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user_id
    }
}

/// Fee configuration for an account.
///
/// Amounts are in the smallest currency unit (cents). Kept configurable so
/// tests can compress fees instead of relying on the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Flat fee deducted once per management-fee charge.
    pub management_fee: i64,
    /// Fee multiplied by the transaction count at charge time.
    pub transaction_fee: i64,
}

impl FeeSchedule {
    pub const MANAGEMENT_FEE: i64 = 500;
    pub const TRANSACTION_FEE: i64 = 10;
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            management_fee: Self::MANAGEMENT_FEE,
            transaction_fee: Self::TRANSACTION_FEE,
        }
    }
}

impl ValueObject for FeeSchedule {}

/// Aggregate root: a strict bank account.
///
/// Balances are i64 cents. A withdrawal can never push the balance below
/// zero; a management-fee charge can.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    holder: Option<AccountHolder>,
    balance: i64,
    transactions_count: u32,
    fees: FeeSchedule,
    version: u64,
    opened: bool,
}

impl Account {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            holder: None,
            balance: 0,
            transactions_count: 0,
            fees: FeeSchedule::default(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn holder(&self) -> Option<&AccountHolder> {
        self.holder.as_ref()
    }

    /// Current balance in cents.
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Number of completed deposits and withdrawals. Fee charges do not
    /// count.
    pub fn transactions_count(&self) -> u32 {
        self.transactions_count
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: AccountId,
    pub holder: AccountHolder,
    pub initial_balance: i64,
    pub fees: FeeSchedule,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub account_id: AccountId,
    /// Requesting user; must be the account holder.
    pub user_id: UserId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub account_id: AccountId,
    /// Requesting user; must be the account holder.
    pub user_id: UserId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChargeManagementFees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeManagementFees {
    pub account_id: AccountId,
    /// Requesting user; must be the account holder.
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    OpenAccount(OpenAccount),
    Deposit(Deposit),
    Withdraw(Withdraw),
    ChargeManagementFees(ChargeManagementFees),
}

/// Event: AccountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub account_id: AccountId,
    pub holder: AccountHolder,
    pub initial_balance: i64,
    pub fees: FeeSchedule,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsDeposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDeposited {
    pub account_id: AccountId,
    pub amount: i64,
    pub new_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    pub account_id: AccountId,
    pub amount: i64,
    pub new_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ManagementFeesCharged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementFeesCharged {
    pub account_id: AccountId,
    /// Total fee deducted: management fee + count * transaction fee.
    pub amount: i64,
    pub new_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountOpened(AccountOpened),
    FundsDeposited(FundsDeposited),
    FundsWithdrawn(FundsWithdrawn),
    ManagementFeesCharged(ManagementFeesCharged),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened(_) => "banking.account.opened",
            AccountEvent::FundsDeposited(_) => "banking.account.funds_deposited",
            AccountEvent::FundsWithdrawn(_) => "banking.account.funds_withdrawn",
            AccountEvent::ManagementFeesCharged(_) => "banking.account.management_fees_charged",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountOpened(e) => e.occurred_at,
            AccountEvent::FundsDeposited(e) => e.occurred_at,
            AccountEvent::FundsWithdrawn(e) => e.occurred_at,
            AccountEvent::ManagementFeesCharged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountOpened(e) => {
                self.id = e.account_id;
                self.holder = Some(e.holder.clone());
                self.balance = e.initial_balance;
                self.transactions_count = 0;
                self.fees = e.fees;
                self.opened = true;
            }
            AccountEvent::FundsDeposited(e) => {
                self.balance = e.new_balance;
                self.transactions_count += 1;
            }
            AccountEvent::FundsWithdrawn(e) => {
                self.balance = e.new_balance;
                self.transactions_count += 1;
            }
            AccountEvent::ManagementFeesCharged(e) => {
                // Fee charges are not transactions: the count stays put.
                self.balance = e.new_balance;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::OpenAccount(cmd) => self.handle_open(cmd),
            AccountCommand::Deposit(cmd) => self.handle_deposit(cmd),
            AccountCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
            AccountCommand::ChargeManagementFees(cmd) => self.handle_charge_fees(cmd),
        }
    }
}

impl Account {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if !self.opened {
            return Err(DomainError::invalid_state("account is not open"));
        }
        Ok(())
    }

    fn ensure_account_id(&self, account_id: AccountId) -> Result<(), DomainError> {
        if self.id != account_id {
            return Err(DomainError::invalid_argument("account_id mismatch"));
        }
        Ok(())
    }

    fn ensure_holder(&self, user_id: UserId) -> Result<(), DomainError> {
        match &self.holder {
            Some(holder) if *holder.id() == user_id => Ok(()),
            _ => Err(DomainError::invalid_argument("account holder mismatch")),
        }
    }

    fn handle_open(&self, cmd: &OpenAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if self.opened {
            return Err(DomainError::invalid_state("account is already open"));
        }

        Ok(vec![AccountEvent::AccountOpened(AccountOpened {
            account_id: cmd.account_id,
            holder: cmd.holder.clone(),
            initial_balance: cmd.initial_balance,
            fees: cmd.fees,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deposit(&self, cmd: &Deposit) -> Result<Vec<AccountEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_account_id(cmd.account_id)?;
        self.ensure_holder(cmd.user_id)?;

        if cmd.amount < 0 {
            return Err(DomainError::invalid_argument(
                "Cannot deposit a negative amount",
            ));
        }

        let new_balance = self
            .balance
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::invalid_argument("balance overflow"))?;

        Ok(vec![AccountEvent::FundsDeposited(FundsDeposited {
            account_id: cmd.account_id,
            amount: cmd.amount,
            new_balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<AccountEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_account_id(cmd.account_id)?;
        self.ensure_holder(cmd.user_id)?;

        if cmd.amount < 0 {
            return Err(DomainError::invalid_argument(
                "Cannot withdraw a negative amount",
            ));
        }
        if cmd.amount > self.balance {
            return Err(DomainError::invalid_argument("Insufficient balance"));
        }

        Ok(vec![AccountEvent::FundsWithdrawn(FundsWithdrawn {
            account_id: cmd.account_id,
            amount: cmd.amount,
            new_balance: self.balance - cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_charge_fees(
        &self,
        cmd: &ChargeManagementFees,
    ) -> Result<Vec<AccountEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_account_id(cmd.account_id)?;
        self.ensure_holder(cmd.user_id)?;

        let per_transaction = self
            .fees
            .transaction_fee
            .checked_mul(self.transactions_count as i64)
            .ok_or_else(|| DomainError::invalid_argument("fee amount overflow"))?;
        let amount = self
            .fees
            .management_fee
            .checked_add(per_transaction)
            .ok_or_else(|| DomainError::invalid_argument("fee amount overflow"))?;

        // No lower bound here: a fee charge may push the balance negative.
        let new_balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| DomainError::invalid_argument("balance overflow"))?;

        Ok(vec![AccountEvent::ManagementFeesCharged(
            ManagementFeesCharged {
                account_id: cmd.account_id,
                amount,
                new_balance,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

impl Account {
    fn execute(&mut self, command: &AccountCommand) -> DomainResult<Vec<AccountEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    /// Open a new account with the default fee schedule.
    pub fn open(
        id: AccountId,
        holder: AccountHolder,
        initial_balance: i64,
        opened_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::open_with_fees(id, holder, initial_balance, FeeSchedule::default(), opened_at)
    }

    /// Open a new account with an explicit fee schedule.
    pub fn open_with_fees(
        id: AccountId,
        holder: AccountHolder,
        initial_balance: i64,
        fees: FeeSchedule,
        opened_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut account = Self::empty(id);
        account.execute(&AccountCommand::OpenAccount(OpenAccount {
            account_id: id,
            holder,
            initial_balance,
            fees,
            occurred_at: opened_at,
        }))?;
        tracing::debug!(account_id = %id, initial_balance, "account opened");
        Ok(account)
    }

    /// Deposit `amount` cents, recording one transaction.
    pub fn deposit(
        &mut self,
        user_id: UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.execute(&AccountCommand::Deposit(Deposit {
            account_id: self.id,
            user_id,
            amount,
            occurred_at: at,
        }))?;
        tracing::debug!(account_id = %self.id, amount, balance = self.balance, "funds deposited");
        Ok(())
    }

    /// Withdraw `amount` cents, recording one transaction.
    pub fn withdraw(
        &mut self,
        user_id: UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.execute(&AccountCommand::Withdraw(Withdraw {
            account_id: self.id,
            user_id,
            amount,
            occurred_at: at,
        }))?;
        tracing::debug!(account_id = %self.id, amount, balance = self.balance, "funds withdrawn");
        Ok(())
    }

    /// Deduct the management fee plus the per-transaction fee for every
    /// transaction recorded so far. Does not count as a transaction itself.
    pub fn charge_management_fees(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.execute(&AccountCommand::ChargeManagementFees(ChargeManagementFees {
            account_id: self.id,
            user_id,
            occurred_at: at,
        }))?;
        tracing::debug!(account_id = %self.id, balance = self.balance, "management fees charged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const INITIAL_BALANCE: i64 = 10_000;

    fn test_account_id() -> AccountId {
        AccountId::new(AggregateId::new())
    }

    fn test_holder() -> AccountHolder {
        AccountHolder::new("Jane", "Doe", UserId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_test_account(holder: &AccountHolder) -> Account {
        Account::open(test_account_id(), holder.clone(), INITIAL_BALANCE, test_time()).unwrap()
    }

    #[test]
    fn open_sets_initial_state() {
        let holder = test_holder();
        let account = open_test_account(&holder);

        assert_eq!(account.holder(), Some(&holder));
        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 0);
        assert_eq!(account.fees(), &FeeSchedule::default());
        assert_eq!(account.version(), 1);
        assert!(account.is_open());
    }

    #[test]
    fn deposit_increases_balance_and_count() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        account.deposit(holder.user_id, 10_000, test_time()).unwrap();

        assert_eq!(account.balance(), INITIAL_BALANCE + 10_000);
        assert_eq!(account.transactions_count(), 1);
    }

    #[test]
    fn management_fees_use_count_at_charge_time() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        account.deposit(holder.user_id, 10_000, test_time()).unwrap();
        let expected_balance = INITIAL_BALANCE + 10_000
            - FeeSchedule::MANAGEMENT_FEE
            - account.transactions_count() as i64 * FeeSchedule::TRANSACTION_FEE;

        account.charge_management_fees(holder.user_id, test_time()).unwrap();

        assert_eq!(account.balance(), expected_balance);
        assert_eq!(account.transactions_count(), 1);
    }

    #[test]
    fn withdraw_rejects_negative_amount() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        let err = account.withdraw(holder.user_id, -1, test_time()).unwrap_err();
        match err {
            DomainError::InvalidArgument(msg) => {
                assert_eq!(msg, "Cannot withdraw a negative amount");
            }
            _ => panic!("Expected InvalidArgument for a negative withdrawal"),
        }
        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 0);
    }

    #[test]
    fn withdraw_rejects_more_than_balance() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        let err = account
            .withdraw(holder.user_id, account.balance() + 1, test_time())
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(msg) => assert_eq!(msg, "Insufficient balance"),
            _ => panic!("Expected InvalidArgument for an overdraw"),
        }
        assert_eq!(account.balance(), INITIAL_BALANCE);
    }

    #[test]
    fn withdraw_of_full_balance_empties_account() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        account
            .withdraw(holder.user_id, INITIAL_BALANCE, test_time())
            .unwrap();

        assert_eq!(account.balance(), 0);
        assert_eq!(account.transactions_count(), 1);
    }

    #[test]
    fn deposit_rejects_negative_amount() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        let err = account.deposit(holder.user_id, -1, test_time()).unwrap_err();
        match err {
            DomainError::InvalidArgument(msg) => {
                assert_eq!(msg, "Cannot deposit a negative amount");
            }
            _ => panic!("Expected InvalidArgument for a negative deposit"),
        }
        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 0);
    }

    #[test]
    fn deposit_overflowing_the_balance_is_rejected() {
        let holder = test_holder();
        let mut account =
            Account::open(test_account_id(), holder.clone(), i64::MAX, test_time()).unwrap();

        let err = account.deposit(holder.user_id, 1, test_time()).unwrap_err();
        match err {
            DomainError::InvalidArgument(_) => {}
            _ => panic!("Expected InvalidArgument for a balance overflow"),
        }
        assert_eq!(err.message(), "balance overflow");
        assert_eq!(account.balance(), i64::MAX);
        assert_eq!(account.transactions_count(), 0);
        assert_eq!(account.version(), 1);
    }

    #[test]
    fn zero_amounts_are_accepted() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);

        account.deposit(holder.user_id, 0, test_time()).unwrap();
        account.withdraw(holder.user_id, 0, test_time()).unwrap();

        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 2);
    }

    #[test]
    fn operations_reject_wrong_holder() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);
        let stranger = UserId::new();

        for err in [
            account.deposit(stranger, 100, test_time()).unwrap_err(),
            account.withdraw(stranger, 100, test_time()).unwrap_err(),
            account.charge_management_fees(stranger, test_time()).unwrap_err(),
        ] {
            match err {
                DomainError::InvalidArgument(msg) => assert_eq!(msg, "account holder mismatch"),
                _ => panic!("Expected InvalidArgument for a non-holder"),
            }
        }
        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 0);
    }

    #[test]
    fn operations_require_an_open_account() {
        let account = Account::empty(test_account_id());
        let cmd = AccountCommand::Deposit(Deposit {
            account_id: account.id_typed(),
            user_id: UserId::new(),
            amount: 100,
            occurred_at: test_time(),
        });

        let err = account.handle(&cmd).unwrap_err();
        match err {
            DomainError::InvalidState(msg) => assert_eq!(msg, "account is not open"),
            _ => panic!("Expected InvalidState for an unopened account"),
        }
    }

    #[test]
    fn reopening_is_rejected() {
        let holder = test_holder();
        let account = open_test_account(&holder);
        let cmd = AccountCommand::OpenAccount(OpenAccount {
            account_id: account.id_typed(),
            holder,
            initial_balance: 0,
            fees: FeeSchedule::default(),
            occurred_at: test_time(),
        });

        let err = account.handle(&cmd).unwrap_err();
        match err {
            DomainError::InvalidState(msg) => assert_eq!(msg, "account is already open"),
            _ => panic!("Expected InvalidState for a re-open"),
        }
    }

    #[test]
    fn fees_can_push_balance_negative() {
        let holder = test_holder();
        let mut account =
            Account::open(test_account_id(), holder.clone(), 0, test_time()).unwrap();

        account.charge_management_fees(holder.user_id, test_time()).unwrap();

        assert_eq!(account.balance(), -FeeSchedule::MANAGEMENT_FEE);
        assert_eq!(account.transactions_count(), 0);
    }

    #[test]
    fn fee_charge_overflowing_the_balance_is_rejected() {
        let holder = test_holder();
        let mut account =
            Account::open(test_account_id(), holder.clone(), i64::MIN, test_time()).unwrap();

        let err = account
            .charge_management_fees(holder.user_id, test_time())
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(_) => {}
            _ => panic!("Expected InvalidArgument for a balance overflow"),
        }
        assert_eq!(err.message(), "balance overflow");
        assert_eq!(account.balance(), i64::MIN);
        assert_eq!(account.version(), 1);
    }

    #[test]
    fn withdrawals_from_a_negative_balance_are_rejected() {
        let holder = test_holder();
        let mut account =
            Account::open(test_account_id(), holder.clone(), 0, test_time()).unwrap();
        account.charge_management_fees(holder.user_id, test_time()).unwrap();
        assert!(account.balance() < 0);

        // Even a zero withdrawal is refused: 0 exceeds a negative balance.
        let err = account.withdraw(holder.user_id, 0, test_time()).unwrap_err();
        match err {
            DomainError::InvalidArgument(msg) => assert_eq!(msg, "Insufficient balance"),
            _ => panic!("Expected InvalidArgument for an overdraw"),
        }
        assert_eq!(account.balance(), -FeeSchedule::MANAGEMENT_FEE);
        assert_eq!(account.transactions_count(), 0);
    }

    #[test]
    fn custom_fee_schedule_is_used() {
        let holder = test_holder();
        let fees = FeeSchedule {
            management_fee: 100,
            transaction_fee: 7,
        };
        let mut account = Account::open_with_fees(
            test_account_id(),
            holder.clone(),
            INITIAL_BALANCE,
            fees,
            test_time(),
        )
        .unwrap();
        assert_eq!(account.fees(), &fees);

        account.deposit(holder.user_id, 1_000, test_time()).unwrap();
        account.charge_management_fees(holder.user_id, test_time()).unwrap();

        assert_eq!(account.balance(), INITIAL_BALANCE + 1_000 - 100 - 7);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let holder = test_holder();
        let account = open_test_account(&holder);
        let cmd = AccountCommand::Withdraw(Withdraw {
            account_id: account.id_typed(),
            user_id: holder.user_id,
            amount: 100,
            occurred_at: test_time(),
        });

        let events1 = account.handle(&cmd).unwrap();
        let events2 = account.handle(&cmd).unwrap();

        assert_eq!(account.balance(), INITIAL_BALANCE);
        assert_eq!(account.transactions_count(), 0);
        assert_eq!(account.version(), 1);
        assert_eq!(events1, events2);
    }

    #[test]
    fn version_increments_on_apply() {
        let holder = test_holder();
        let mut account = open_test_account(&holder);
        assert_eq!(account.version(), 1);

        account.deposit(holder.user_id, 100, test_time()).unwrap();
        assert_eq!(account.version(), 2);

        account.withdraw(holder.user_id, 50, test_time()).unwrap();
        assert_eq!(account.version(), 3);

        account.charge_management_fees(holder.user_id, test_time()).unwrap();
        assert_eq!(account.version(), 4);
    }

    #[test]
    fn apply_is_deterministic() {
        let id = test_account_id();
        let holder = test_holder();
        let opened = AccountEvent::AccountOpened(AccountOpened {
            account_id: id,
            holder: holder.clone(),
            initial_balance: INITIAL_BALANCE,
            fees: FeeSchedule::default(),
            occurred_at: test_time(),
        });
        let deposited = AccountEvent::FundsDeposited(FundsDeposited {
            account_id: id,
            amount: 2_500,
            new_balance: INITIAL_BALANCE + 2_500,
            occurred_at: test_time(),
        });

        let mut account1 = Account::empty(id);
        account1.apply(&opened);
        account1.apply(&deposited);

        let mut account2 = Account::empty(id);
        account2.apply(&opened);
        account2.apply(&deposited);

        assert_eq!(account1.balance(), account2.balance());
        assert_eq!(account1.transactions_count(), account2.transactions_count());
        assert_eq!(account1.version(), account2.version());
        assert_eq!(account1.holder(), account2.holder());
        assert_eq!(account1.balance(), INITIAL_BALANCE + 2_500);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: over any sequence of valid deposits and withdrawals, the
        /// balance tracks initial + deposits - withdrawals, the count tracks
        /// the number of completed operations, and the balance never goes
        /// negative.
        #[test]
        fn balance_tracks_completed_operations(
            ops in prop::collection::vec((any::<bool>(), 0i64..100_000i64), 1..32)
        ) {
            let holder = test_holder();
            let mut account = Account::open(
                test_account_id(),
                holder.clone(),
                INITIAL_BALANCE,
                test_time(),
            )
            .unwrap();

            let mut expected_balance = INITIAL_BALANCE;
            let mut expected_count = 0u32;

            for (is_withdraw, amount) in ops {
                if is_withdraw && amount <= account.balance() {
                    account.withdraw(holder.user_id, amount, test_time()).unwrap();
                    expected_balance -= amount;
                } else {
                    account.deposit(holder.user_id, amount, test_time()).unwrap();
                    expected_balance += amount;
                }
                expected_count += 1;
                prop_assert!(account.balance() >= 0);
            }

            prop_assert_eq!(account.balance(), expected_balance);
            prop_assert_eq!(account.transactions_count(), expected_count);
        }
    }
}
