use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;
use vitrine_shared::{Amount, UserId};

use crate::error::StoreError;

/// Per-user balance ledger.
///
/// The ledger is the authority on money: the state machine checks
/// affordability before calling, but `debit` re-validates so a stale
/// check can never drive a balance negative. Every mutation commits
/// before any dependent external call is issued.
#[derive(Clone, Default)]
pub struct BalanceService {
    balances: Arc<Mutex<HashMap<UserId, Amount>>>,
}

impl BalanceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, user_id: UserId) -> Amount {
        self.balances
            .lock()
            .expect("balance lock poisoned")
            .get(&user_id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn credit(&self, user_id: UserId, amount: Amount) -> Result<Amount, StoreError> {
        if !amount.is_positive() {
            return Err(StoreError::StateMismatch("credit of a non-positive amount"));
        }
        let mut balances = self.balances.lock().expect("balance lock poisoned");
        let entry = balances.entry(user_id).or_insert(Amount::ZERO);
        *entry += amount;
        info!(user_id, %amount, new_balance = %entry, "balance credited");
        Ok(*entry)
    }

    pub fn debit(&self, user_id: UserId, amount: Amount) -> Result<Amount, StoreError> {
        if !amount.is_positive() {
            return Err(StoreError::StateMismatch("debit of a non-positive amount"));
        }
        let mut balances = self.balances.lock().expect("balance lock poisoned");
        let entry = balances.entry(user_id).or_insert(Amount::ZERO);
        if amount > *entry {
            return Err(StoreError::InsufficientFunds {
                available: *entry,
                required: amount,
            });
        }
        *entry -= amount;
        info!(user_id, %amount, new_balance = %entry, "balance debited");
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_has_zero_balance() {
        let ledger = BalanceService::new();
        assert_eq!(ledger.balance(1), Amount::ZERO);
    }

    #[test]
    fn credit_then_debit() {
        let ledger = BalanceService::new();
        ledger.credit(1, Amount::from_centavos(5000)).unwrap();
        let remaining = ledger.debit(1, Amount::from_centavos(1000)).unwrap();
        assert_eq!(remaining, Amount::from_centavos(4000));
        assert_eq!(ledger.balance(1), Amount::from_centavos(4000));
    }

    #[test]
    fn debit_never_goes_negative() {
        let ledger = BalanceService::new();
        ledger.credit(1, Amount::from_centavos(500)).unwrap();
        let err = ledger.debit(1, Amount::from_centavos(1000)).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(1), Amount::from_centavos(500));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let ledger = BalanceService::new();
        assert!(ledger.credit(1, Amount::ZERO).is_err());
        assert!(ledger.debit(1, Amount::from_centavos(-100)).is_err());
    }

    #[test]
    fn balances_are_partitioned_by_user() {
        let ledger = BalanceService::new();
        ledger.credit(1, Amount::from_centavos(1000)).unwrap();
        ledger.credit(2, Amount::from_centavos(2000)).unwrap();
        ledger.debit(1, Amount::from_centavos(300)).unwrap();
        assert_eq!(ledger.balance(1), Amount::from_centavos(700));
        assert_eq!(ledger.balance(2), Amount::from_centavos(2000));
    }
}
