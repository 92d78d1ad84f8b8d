// ledger/mod.rs
// Per-user currency wallets and the append-only ledger that derives their
// balances.

use database::{Persistence, TransactionKind};
use log::warn;

use crate::error::StorageError;
use crate::protocol::WalletEntry;

#[derive(Debug)]
pub struct Ledger<P: Persistence> {
    persistence: P,
}

impl<P: Persistence> Ledger<P> {
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    pub fn create_wallet(&self, user_id: i32, currency: &str) -> Result<i32, StorageError> {
        Ok(self.persistence.create_wallet(user_id, currency)?)
    }

    pub fn make_transaction(
        &self,
        wallet_id: i32,
        amount: f32,
        kind: TransactionKind,
        description: &str,
    ) -> Result<bool, StorageError> {
        Ok(self.persistence.make_transaction(wallet_id, amount, kind, description)?)
    }

    /// Returns `None` on storage failure, mirroring the original's
    /// `optional<vector<WalletInfo>>` return type for `wallets()`.
    pub fn wallets(&self, user_id: i32) -> Option<Vec<WalletEntry>> {
        let wallets = match self.persistence.list_wallets(user_id) {
            Ok(w) => w,
            Err(e) => {
                warn!("listing wallets for user {user_id} failed: {e:#}");
                return None;
            }
        };

        let mut out = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            match self.persistence.wallet_balance(wallet.id) {
                Ok(amount) => out.push(WalletEntry {
                    id: wallet.id,
                    currency: wallet.currency,
                    amount,
                }),
                Err(e) => {
                    warn!("computing balance for wallet {} failed: {e:#}", wallet.id);
                    return None;
                }
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::MockPersistence;

    #[test]
    fn wallets_reports_derived_balance_per_currency() {
        let ledger = Ledger::new(MockPersistence::new());
        let usd = ledger.create_wallet(1, "USD").unwrap();
        let rub = ledger.create_wallet(1, "RUB").unwrap();
        ledger
            .make_transaction(usd, 50.0, TransactionKind::Deposit, "Exchange actions")
            .unwrap();
        ledger
            .make_transaction(rub, 20.0, TransactionKind::Withdraw, "Exchange actions")
            .unwrap();

        let wallets = ledger.wallets(1).expect("storage succeeds");
        let usd_entry = wallets.iter().find(|w| w.currency == "USD").unwrap();
        let rub_entry = wallets.iter().find(|w| w.currency == "RUB").unwrap();
        assert_eq!(usd_entry.amount, 50.0);
        assert_eq!(rub_entry.amount, -20.0);
    }
}
