use anyhow::Result;
use std::fmt::Debug;

use crate::models::*;

/// Settlement of one matched trade: four ledger rows plus the buyer/seller
/// order mutations, applied inside a single storage transaction.
///
/// Grounded in the shape of a trade settlement call: both counterparties'
/// wallets, the trade amount and price, and whether each side's order row
/// should be deleted (fully consumed) or updated to a reduced `amount`.
#[derive(Debug, Clone)]
pub struct TradeSettlement {
    pub buyer_quote_wallet_id: i32,
    pub buyer_base_wallet_id: i32,
    pub seller_base_wallet_id: i32,
    pub seller_quote_wallet_id: i32,
    pub trade_amount: f32,
    pub price: f32,
    pub buyer_order_id: i32,
    pub seller_order_id: i32,
    /// `None` means delete the row; `Some(amount)` means update it in place.
    pub buyer_remaining: Option<f32>,
    pub seller_remaining: Option<f32>,
}

/// Storage seam between the core exchange components and the database.
///
/// Deliberately not `Send + Sync`: the cooperative single-threaded runtime
/// that drives the rest of this crate touches persistence only from its one
/// event loop, so the teacher's `Send + Sync` bound (needed there for a
/// multi-threaded order book) is dropped here rather than satisfied with a
/// lock nothing will ever contend on.
pub trait Persistence: Clone + Debug {
    // Users / LoginSystem

    fn create_user(&self, user_name: &str, verifier: &str) -> Result<i32>;
    fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>>;
    fn get_user(&self, user_id: i32) -> Result<Option<User>>;

    // Wallets / Ledger

    fn create_wallet(&self, user_id: i32, currency: &str) -> Result<i32>;
    fn get_wallet(&self, user_id: i32, currency: &str) -> Result<Option<Wallet>>;
    fn list_wallets(&self, user_id: i32) -> Result<Vec<Wallet>>;
    fn make_transaction(
        &self,
        wallet_id: i32,
        amount: f32,
        kind: TransactionKind,
        description: &str,
    ) -> Result<bool>;
    fn wallet_balance(&self, wallet_id: i32) -> Result<f32>;

    // Orders / OrderBook

    fn make_request(
        &self,
        user_id: i32,
        pair: &str,
        amount: f32,
        price: f32,
        side: OrderSide,
    ) -> Result<bool>;
    fn remove_request(&self, order_id: i32) -> Result<bool>;
    fn get_order(&self, order_id: i32) -> Result<Option<Order>>;
    fn list_open_buys(&self) -> Result<Vec<Order>>;
    fn find_single_shot_seller(
        &self,
        pair: &str,
        max_price: f32,
        min_amount: f32,
        exclude_user_id: i32,
    ) -> Result<Option<Order>>;
    fn list_partial_sellers(
        &self,
        pair: &str,
        max_price: f32,
        max_amount_exclusive: f32,
        exclude_user_id: i32,
    ) -> Result<Vec<Order>>;

    // Matcher settlement

    fn settle_trade(&self, settlement: TradeSettlement) -> Result<()>;
}
