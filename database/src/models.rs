// models.rs
// Diesel ORM models corresponding to database tables

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::*;

/// Ledger entry direction. Stored as a small integer, not text, since the
/// original schema carries it as `transaction_type INTEGER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Withdraw,
    Deposit,
}

impl TransactionKind {
    pub fn as_i32(&self) -> i32 {
        match self {
            TransactionKind::Withdraw => 0,
            TransactionKind::Deposit => 1,
        }
    }

    pub fn from_i32(v: i32) -> Result<Self, String> {
        match v {
            0 => Ok(TransactionKind::Withdraw),
            1 => Ok(TransactionKind::Deposit),
            other => Err(format!("unknown transaction_type: {other}")),
        }
    }
}

/// Order side. Stored as `request_type INTEGER`: 0 = Buy, 1 = Sell, matching
/// the wire `MakeRequest` payload's `request_type` field one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_i32(&self) -> i32 {
        match self {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }

    pub fn from_i32(v: i32) -> Result<Self, String> {
        match v {
            0 => Ok(OrderSide::Buy),
            1 => Ok(OrderSide::Sell),
            other => Err(format!("unknown request_type: {other}")),
        }
    }
}

// User model

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub user_name: String,
    pub v: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub user_name: String,
    pub v: String,
}

// Wallet model

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = wallets)]
pub struct Wallet {
    pub id: i32,
    pub user_id: i32,
    pub currency: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wallets)]
pub struct NewWallet {
    pub user_id: i32,
    pub currency: String,
}

// WalletTransaction model (ledger row)

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = transactions)]
pub struct WalletTransaction {
    pub id: i32,
    pub wallet_id: i32,
    pub amount: f32,
    pub transaction_type: i32,
    pub description: String,
}

impl WalletTransaction {
    pub fn kind(&self) -> Result<TransactionKind, String> {
        TransactionKind::from_i32(self.transaction_type)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewWalletTransaction {
    pub wallet_id: i32,
    pub amount: f32,
    pub transaction_type: i32,
    pub description: String,
}

// Order model (open order book entry, `requests` table)

#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = requests)]
pub struct Order {
    pub id: i32,
    pub user_id: i32,
    pub currency: String,
    pub amount: f32,
    pub price: f32,
    pub request_type: i32,
}

impl Order {
    pub fn side(&self) -> Result<OrderSide, String> {
        OrderSide::from_i32(self.request_type)
    }

    /// Splits the pair tag ("BASE/QUOTE") into its two legs.
    pub fn pair_legs(&self) -> Option<(&str, &str)> {
        self.currency.split_once('/')
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = requests)]
pub struct NewOrder {
    pub user_id: i32,
    pub currency: String,
    pub amount: f32,
    pub price: f32,
    pub request_type: i32,
}

/// A resolved view of a wallet and its derived balance, returned by
/// [`crate::Persistence::wallets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: i32,
    pub currency: String,
    pub amount: f32,
}
