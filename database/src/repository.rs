// repository.rs
// Diesel/SQLite-backed implementation of the `Persistence` trait.

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::sql_types::Integer;
use log::{debug, info, warn};

use crate::db::{get_connection, DbConnection, DbPool};
use crate::models::*;
use crate::persistence::{Persistence, TradeSettlement};
use crate::schema::{requests, transactions, users, wallets};

diesel::sql_function!(fn last_insert_rowid() -> Integer);

#[derive(Debug, Clone)]
pub struct SqlitePersistence {
    pool: DbPool,
}

impl SqlitePersistence {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> DbConnection {
        get_connection(&self.pool)
    }
}

impl Persistence for SqlitePersistence {
    fn create_user(&self, user_name: &str, verifier: &str) -> Result<i32> {
        let mut conn = self.conn();
        conn.transaction(|conn| {
            diesel::insert_into(users::table)
                .values(NewUser {
                    user_name: user_name.to_string(),
                    v: verifier.to_string(),
                })
                .execute(conn)?;
            diesel::select(last_insert_rowid()).get_result::<i32>(conn)
        })
        .context("inserting user")
    }

    fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>> {
        let mut conn = self.conn();
        users::table
            .filter(users::user_name.eq(user_name))
            .first(&mut conn)
            .optional()
            .context("looking up user by name")
    }

    fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        let mut conn = self.conn();
        users::table
            .find(user_id)
            .first(&mut conn)
            .optional()
            .context("looking up user by id")
    }

    fn create_wallet(&self, user_id: i32, currency: &str) -> Result<i32> {
        let mut conn = self.conn();
        debug!("creating wallet for user {user_id} ({currency})");
        conn.transaction(|conn| {
            diesel::insert_into(wallets::table)
                .values(NewWallet {
                    user_id,
                    currency: currency.to_string(),
                })
                .execute(conn)?;
            diesel::select(last_insert_rowid()).get_result::<i32>(conn)
        })
        .context("inserting wallet")
    }

    fn get_wallet(&self, user_id: i32, currency: &str) -> Result<Option<Wallet>> {
        let mut conn = self.conn();
        wallets::table
            .filter(wallets::user_id.eq(user_id))
            .filter(wallets::currency.eq(currency))
            .first(&mut conn)
            .optional()
            .context("looking up wallet")
    }

    fn list_wallets(&self, user_id: i32) -> Result<Vec<Wallet>> {
        let mut conn = self.conn();
        wallets::table
            .filter(wallets::user_id.eq(user_id))
            .load(&mut conn)
            .context("listing wallets")
    }

    fn make_transaction(
        &self,
        wallet_id: i32,
        amount: f32,
        kind: TransactionKind,
        description: &str,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let written = diesel::insert_into(transactions::table)
            .values(NewWalletTransaction {
                wallet_id,
                amount,
                transaction_type: kind.as_i32(),
                description: description.to_string(),
            })
            .execute(&mut conn)
            .context("appending ledger row")?;
        Ok(written > 0)
    }

    fn wallet_balance(&self, wallet_id: i32) -> Result<f32> {
        use diesel::dsl::sum;

        let mut conn = self.conn();
        let deposits: Option<f32> = transactions::table
            .filter(transactions::wallet_id.eq(wallet_id))
            .filter(transactions::transaction_type.eq(TransactionKind::Deposit.as_i32()))
            .select(sum(transactions::amount))
            .first(&mut conn)
            .context("summing deposits")?;
        let withdrawals: Option<f32> = transactions::table
            .filter(transactions::wallet_id.eq(wallet_id))
            .filter(transactions::transaction_type.eq(TransactionKind::Withdraw.as_i32()))
            .select(sum(transactions::amount))
            .first(&mut conn)
            .context("summing withdrawals")?;
        Ok(deposits.unwrap_or(0.0) - withdrawals.unwrap_or(0.0))
    }

    fn make_request(
        &self,
        user_id: i32,
        pair: &str,
        amount: f32,
        price: f32,
        side: OrderSide,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let written = diesel::insert_into(requests::table)
            .values(NewOrder {
                user_id,
                currency: pair.to_string(),
                amount,
                price,
                request_type: side.as_i32(),
            })
            .execute(&mut conn)
            .context("inserting order")?;
        Ok(written > 0)
    }

    fn remove_request(&self, order_id: i32) -> Result<bool> {
        let mut conn = self.conn();
        let deleted = diesel::delete(requests::table.find(order_id))
            .execute(&mut conn)
            .context("deleting order")?;
        Ok(deleted > 0)
    }

    fn get_order(&self, order_id: i32) -> Result<Option<Order>> {
        let mut conn = self.conn();
        requests::table
            .find(order_id)
            .first(&mut conn)
            .optional()
            .context("looking up order")
    }

    fn list_open_buys(&self) -> Result<Vec<Order>> {
        let mut conn = self.conn();
        requests::table
            .filter(requests::request_type.eq(OrderSide::Buy.as_i32()))
            .order((requests::price.desc(), requests::id.asc()))
            .load(&mut conn)
            .context("listing open buys")
    }

    fn find_single_shot_seller(
        &self,
        pair: &str,
        max_price: f32,
        min_amount: f32,
        exclude_user_id: i32,
    ) -> Result<Option<Order>> {
        let mut conn = self.conn();
        requests::table
            .filter(requests::request_type.eq(OrderSide::Sell.as_i32()))
            .filter(requests::currency.eq(pair))
            .filter(requests::price.le(max_price))
            .filter(requests::amount.ge(min_amount))
            .filter(requests::user_id.ne(exclude_user_id))
            .order((requests::price.asc(), requests::id.asc()))
            .first(&mut conn)
            .optional()
            .context("finding single-shot seller")
    }

    fn list_partial_sellers(
        &self,
        pair: &str,
        max_price: f32,
        max_amount_exclusive: f32,
        exclude_user_id: i32,
    ) -> Result<Vec<Order>> {
        let mut conn = self.conn();
        requests::table
            .filter(requests::request_type.eq(OrderSide::Sell.as_i32()))
            .filter(requests::currency.eq(pair))
            .filter(requests::price.le(max_price))
            .filter(requests::amount.lt(max_amount_exclusive))
            .filter(requests::user_id.ne(exclude_user_id))
            .order((requests::price.asc(), requests::id.asc()))
            .load(&mut conn)
            .context("listing partial-fill sellers")
    }

    fn settle_trade(&self, settlement: TradeSettlement) -> Result<()> {
        let mut conn = self.conn();
        let quote_amount = settlement.trade_amount * settlement.price;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let rows = [
                (
                    settlement.buyer_quote_wallet_id,
                    quote_amount,
                    TransactionKind::Withdraw,
                ),
                (
                    settlement.buyer_base_wallet_id,
                    settlement.trade_amount,
                    TransactionKind::Deposit,
                ),
                (
                    settlement.seller_base_wallet_id,
                    settlement.trade_amount,
                    TransactionKind::Withdraw,
                ),
                (
                    settlement.seller_quote_wallet_id,
                    quote_amount,
                    TransactionKind::Deposit,
                ),
            ];
            for (wallet_id, amount, kind) in rows {
                let written = diesel::insert_into(transactions::table)
                    .values(NewWalletTransaction {
                        wallet_id,
                        amount,
                        transaction_type: kind.as_i32(),
                        description: "Exchange actions".to_string(),
                    })
                    .execute(conn)?;
                if written == 0 {
                    anyhow::bail!("ledger row was not written for wallet {wallet_id}");
                }
            }

            match settlement.buyer_remaining {
                None => {
                    diesel::delete(requests::table.find(settlement.buyer_order_id)).execute(conn)?;
                }
                Some(remaining) => {
                    diesel::update(requests::table.find(settlement.buyer_order_id))
                        .set(requests::amount.eq(remaining))
                        .execute(conn)?;
                }
            }

            match settlement.seller_remaining {
                None => {
                    diesel::delete(requests::table.find(settlement.seller_order_id)).execute(conn)?;
                }
                Some(remaining) => {
                    diesel::update(requests::table.find(settlement.seller_order_id))
                        .set(requests::amount.eq(remaining))
                        .execute(conn)?;
                }
            }

            Ok(())
        })?;

        info!(
            "settled trade: buyer order {} x seller order {} @ {} for {} units",
            settlement.buyer_order_id, settlement.seller_order_id, settlement.price, settlement.trade_amount
        );
        Ok(())
    }
}

pub fn log_settlement_failure(err: &anyhow::Error) {
    warn!("trade settlement rolled back: {err:#}");
}
