// mock.rs
// In-memory stand-in for `SqlitePersistence`, used by the core components'
// unit tests so they don't need a real SQLite file.

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;

use crate::models::*;
use crate::persistence::{Persistence, TradeSettlement};

#[derive(Debug, Default)]
struct MockState {
    users: Vec<User>,
    wallets: Vec<Wallet>,
    transactions: Vec<WalletTransaction>,
    orders: Vec<Order>,
    next_user_id: i32,
    next_wallet_id: i32,
    next_tx_id: i32,
    next_order_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MockPersistence(Rc<RefCell<MockState>>);

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MockPersistence {
    fn create_user(&self, user_name: &str, verifier: &str) -> Result<i32> {
        let mut state = self.0.borrow_mut();
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.push(User {
            id,
            user_name: user_name.to_string(),
            v: verifier.to_string(),
        });
        Ok(id)
    }

    fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>> {
        Ok(self
            .0
            .borrow()
            .users
            .iter()
            .find(|u| u.user_name == user_name)
            .cloned())
    }

    fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        Ok(self.0.borrow().users.iter().find(|u| u.id == user_id).cloned())
    }

    fn create_wallet(&self, user_id: i32, currency: &str) -> Result<i32> {
        let mut state = self.0.borrow_mut();
        state.next_wallet_id += 1;
        let id = state.next_wallet_id;
        state.wallets.push(Wallet {
            id,
            user_id,
            currency: currency.to_string(),
        });
        Ok(id)
    }

    fn get_wallet(&self, user_id: i32, currency: &str) -> Result<Option<Wallet>> {
        Ok(self
            .0
            .borrow()
            .wallets
            .iter()
            .find(|w| w.user_id == user_id && w.currency == currency)
            .cloned())
    }

    fn list_wallets(&self, user_id: i32) -> Result<Vec<Wallet>> {
        Ok(self
            .0
            .borrow()
            .wallets
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    fn make_transaction(
        &self,
        wallet_id: i32,
        amount: f32,
        kind: TransactionKind,
        description: &str,
    ) -> Result<bool> {
        let mut state = self.0.borrow_mut();
        state.next_tx_id += 1;
        let id = state.next_tx_id;
        state.transactions.push(WalletTransaction {
            id,
            wallet_id,
            amount,
            transaction_type: kind.as_i32(),
            description: description.to_string(),
        });
        Ok(true)
    }

    fn wallet_balance(&self, wallet_id: i32) -> Result<f32> {
        let state = self.0.borrow();
        let mut balance = 0.0f32;
        for tx in state.transactions.iter().filter(|t| t.wallet_id == wallet_id) {
            match tx.kind().expect("mock-inserted rows always carry a valid kind") {
                TransactionKind::Deposit => balance += tx.amount,
                TransactionKind::Withdraw => balance -= tx.amount,
            }
        }
        Ok(balance)
    }

    fn make_request(
        &self,
        user_id: i32,
        pair: &str,
        amount: f32,
        price: f32,
        side: OrderSide,
    ) -> Result<bool> {
        let mut state = self.0.borrow_mut();
        state.next_order_id += 1;
        let id = state.next_order_id;
        state.orders.push(Order {
            id,
            user_id,
            currency: pair.to_string(),
            amount,
            price,
            request_type: side.as_i32(),
        });
        Ok(true)
    }

    fn remove_request(&self, order_id: i32) -> Result<bool> {
        let mut state = self.0.borrow_mut();
        let before = state.orders.len();
        state.orders.retain(|o| o.id != order_id);
        Ok(state.orders.len() < before)
    }

    fn get_order(&self, order_id: i32) -> Result<Option<Order>> {
        Ok(self.0.borrow().orders.iter().find(|o| o.id == order_id).cloned())
    }

    fn list_open_buys(&self) -> Result<Vec<Order>> {
        let mut buys: Vec<Order> = self
            .0
            .borrow()
            .orders
            .iter()
            .filter(|o| o.request_type == OrderSide::Buy.as_i32())
            .cloned()
            .collect();
        buys.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap().then(a.id.cmp(&b.id)));
        Ok(buys)
    }

    fn find_single_shot_seller(
        &self,
        pair: &str,
        max_price: f32,
        min_amount: f32,
        exclude_user_id: i32,
    ) -> Result<Option<Order>> {
        let state = self.0.borrow();
        let mut candidates: Vec<&Order> = state
            .orders
            .iter()
            .filter(|o| {
                o.request_type == OrderSide::Sell.as_i32()
                    && o.currency == pair
                    && o.price <= max_price
                    && o.amount >= min_amount
                    && o.user_id != exclude_user_id
            })
            .collect();
        candidates.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap().then(a.id.cmp(&b.id)));
        Ok(candidates.into_iter().next().cloned())
    }

    fn list_partial_sellers(
        &self,
        pair: &str,
        max_price: f32,
        max_amount_exclusive: f32,
        exclude_user_id: i32,
    ) -> Result<Vec<Order>> {
        let state = self.0.borrow();
        let mut candidates: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| {
                o.request_type == OrderSide::Sell.as_i32()
                    && o.currency == pair
                    && o.price <= max_price
                    && o.amount < max_amount_exclusive
                    && o.user_id != exclude_user_id
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap().then(a.id.cmp(&b.id)));
        Ok(candidates)
    }

    fn settle_trade(&self, settlement: TradeSettlement) -> Result<()> {
        let quote_amount = settlement.trade_amount * settlement.price;
        self.make_transaction(
            settlement.buyer_quote_wallet_id,
            quote_amount,
            TransactionKind::Withdraw,
            "Exchange actions",
        )?;
        self.make_transaction(
            settlement.buyer_base_wallet_id,
            settlement.trade_amount,
            TransactionKind::Deposit,
            "Exchange actions",
        )?;
        self.make_transaction(
            settlement.seller_base_wallet_id,
            settlement.trade_amount,
            TransactionKind::Withdraw,
            "Exchange actions",
        )?;
        self.make_transaction(
            settlement.seller_quote_wallet_id,
            quote_amount,
            TransactionKind::Deposit,
            "Exchange actions",
        )?;

        let mut state = self.0.borrow_mut();
        match settlement.buyer_remaining {
            None => state.orders.retain(|o| o.id != settlement.buyer_order_id),
            Some(remaining) => {
                if let Some(o) = state.orders.iter_mut().find(|o| o.id == settlement.buyer_order_id) {
                    o.amount = remaining;
                }
            }
        }
        match settlement.seller_remaining {
            None => state.orders.retain(|o| o.id != settlement.seller_order_id),
            Some(remaining) => {
                if let Some(o) = state.orders.iter_mut().find(|o| o.id == settlement.seller_order_id) {
                    o.amount = remaining;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_balance_follows_deposits_minus_withdrawals() {
        let db = MockPersistence::new();
        let wallet_id = db.create_wallet(1, "USD").unwrap();
        db.make_transaction(wallet_id, 100.0, TransactionKind::Deposit, "top up")
            .unwrap();
        db.make_transaction(wallet_id, 30.0, TransactionKind::Withdraw, "spend")
            .unwrap();
        assert_eq!(db.wallet_balance(wallet_id).unwrap(), 70.0);
    }

    #[test]
    fn single_shot_seller_prefers_lowest_price_then_lowest_id() {
        let db = MockPersistence::new();
        db.make_request(2, "USD/RUB", 40.0, 70.0, OrderSide::Sell).unwrap();
        db.make_request(3, "USD/RUB", 120.0, 65.0, OrderSide::Sell).unwrap();
        let found = db
            .find_single_shot_seller("USD/RUB", 70.0, 40.0, 1)
            .unwrap()
            .expect("a qualifying seller exists");
        assert_eq!(found.user_id, 3);
    }
}
