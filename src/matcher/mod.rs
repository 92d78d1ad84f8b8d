// matcher/mod.rs
// The order-matching algorithm: outer pass over open Buy orders, a
// single-shot full-match attempt per buyer, falling back to partial-fill
// consumption of smaller sellers. Settlement is delegated to the
// persistence layer as one atomic transaction per trade.
//
// Grounded directly in the original `Exchange::process_requests` /
// `request_step`: the query shapes (single-shot LIMIT 1 vs the ordered
// partial-fill scan), the fixed "Exchange actions" ledger description, and
// the per-trade transaction boundary all mirror it line for line. Order-row
// disposition (delete vs update) is generalized into one symmetric rule
// that produces the original's asymmetric single-shot behavior as a special
// case (see the Single-shot deletion asymmetry note).

use anyhow::Result;
use database::{Order, Persistence, TradeSettlement};
use log::{debug, warn};

#[derive(Debug)]
pub struct Matcher<P: Persistence> {
    persistence: P,
}

impl<P: Persistence> Matcher<P> {
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    /// Runs one full pass over the order book. Storage failures abort the
    /// whole pass; they are logged and swallowed, never surfaced to the
    /// caller (the caller is either process startup or a `MakeRequest`
    /// handler that has already replied `Success` for the insert).
    pub fn process_requests(&self) {
        if let Err(e) = self.try_process_requests() {
            warn!("matcher pass aborted: {e:#}");
        }
    }

    fn try_process_requests(&self) -> Result<()> {
        // Snapshot the outer cursor once: each buyer in this pass is visited
        // exactly once, even though settlement mutates the `requests` table
        // under us. Seller queries below are re-issued per buyer and so
        // always see the current table state.
        let buyers = self.persistence.list_open_buys()?;
        for buyer in buyers {
            self.process_buyer(&buyer)?;
        }
        Ok(())
    }

    fn process_buyer(&self, buyer: &Order) -> Result<()> {
        if let Some((base, quote)) = buyer.pair_legs() {
            let _ = (base, quote); // pair is only used to build the lookup key below
        } else {
            warn!("order {} has a malformed pair {:?}, skipping", buyer.id, buyer.currency);
            return Ok(());
        }

        if let Some(seller) = self.persistence.find_single_shot_seller(
            &buyer.currency,
            buyer.price,
            buyer.amount,
            buyer.user_id,
        )? {
            // Single-shot: the seller always has amount >= buyer.amount, so
            // the buyer is always fully filled here.
            let seller_remaining = seller.amount - buyer.amount;
            self.settle(
                buyer,
                &seller,
                buyer.amount,
                None,
                if seller_remaining > 0.0 { Some(seller_remaining) } else { None },
            )?;
            return Ok(());
        }

        let sellers = self.persistence.list_partial_sellers(
            &buyer.currency,
            buyer.price,
            buyer.amount,
            buyer.user_id,
        )?;

        let mut remaining = buyer.amount;
        for seller in sellers {
            if remaining <= 0.0 {
                break;
            }
            let trade_amount = seller.amount;
            remaining -= trade_amount;
            // The seller is always fully consumed in partial-fill mode.
            self.settle(
                buyer,
                &seller,
                trade_amount,
                if remaining > 0.0 { Some(remaining) } else { None },
                None,
            )?;
        }
        Ok(())
    }

    fn settle(
        &self,
        buyer: &Order,
        seller: &Order,
        trade_amount: f32,
        buyer_remaining: Option<f32>,
        seller_remaining: Option<f32>,
    ) -> Result<()> {
        let (base, quote) = buyer
            .pair_legs()
            .expect("validated by the caller before settlement is attempted");

        let buyer_quote_wallet = self
            .persistence
            .get_wallet(buyer.user_id, quote)?
            .ok_or_else(|| anyhow::anyhow!("buyer {} has no {quote} wallet", buyer.user_id))?;
        let buyer_base_wallet = self
            .persistence
            .get_wallet(buyer.user_id, base)?
            .ok_or_else(|| anyhow::anyhow!("buyer {} has no {base} wallet", buyer.user_id))?;
        let seller_base_wallet = self
            .persistence
            .get_wallet(seller.user_id, base)?
            .ok_or_else(|| anyhow::anyhow!("seller {} has no {base} wallet", seller.user_id))?;
        let seller_quote_wallet = self
            .persistence
            .get_wallet(seller.user_id, quote)?
            .ok_or_else(|| anyhow::anyhow!("seller {} has no {quote} wallet", seller.user_id))?;

        let settlement = TradeSettlement {
            buyer_quote_wallet_id: buyer_quote_wallet.id,
            buyer_base_wallet_id: buyer_base_wallet.id,
            seller_base_wallet_id: seller_base_wallet.id,
            seller_quote_wallet_id: seller_quote_wallet.id,
            trade_amount,
            price: buyer.price,
            buyer_order_id: buyer.id,
            seller_order_id: seller.id,
            buyer_remaining,
            seller_remaining,
        };

        match self.persistence.settle_trade(settlement) {
            Ok(()) => {
                debug!(
                    "trade: buyer {} x seller {} @ {} for {} {base}/{quote}",
                    buyer.user_id, seller.user_id, buyer.price, trade_amount
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "trade rolled back (buyer {} x seller {}): {e:#}",
                    buyer.user_id, seller.user_id
                );
                // A rollback aborts only this trade; outer iteration continues.
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{MockPersistence, OrderSide};

    fn setup_user(db: &MockPersistence, user_id: i32) -> (i32, i32) {
        let usd = db.create_wallet(user_id, "USD").unwrap();
        let rub = db.create_wallet(user_id, "RUB").unwrap();
        (usd, rub)
    }

    fn balance(db: &MockPersistence, wallet_id: i32) -> f32 {
        db.wallet_balance(wallet_id).unwrap()
    }

    #[test]
    fn scenario_3_full_match_parity() {
        let db = MockPersistence::new();
        let mut usd = vec![0i32; 6];
        let mut rub = vec![0i32; 6];
        for user_id in 1..=5 {
            let (u, r) = setup_user(&db, user_id);
            usd[user_id as usize] = u;
            rub[user_id as usize] = r;
        }

        db.make_request(1, "USD/RUB", 50.0, 62.0, OrderSide::Sell).unwrap();
        db.make_request(2, "USD/RUB", 50.0, 63.0, OrderSide::Buy).unwrap();
        db.make_request(3, "USD/RUB", 50.0, 64.0, OrderSide::Buy).unwrap();
        db.make_request(4, "USD/RUB", 50.0, 60.0, OrderSide::Buy).unwrap();
        db.make_request(5, "USD/RUB", 50.0, 61.0, OrderSide::Sell).unwrap();

        Matcher::new(db.clone()).process_requests();

        assert_eq!(balance(&db, rub[1]), 3150.0);
        assert_eq!(balance(&db, usd[1]), -50.0);
        assert_eq!(balance(&db, rub[2]), -3150.0);
        assert_eq!(balance(&db, usd[2]), 50.0);
        assert_eq!(balance(&db, rub[3]), -3200.0);
        assert_eq!(balance(&db, usd[3]), 50.0);
        assert_eq!(balance(&db, rub[4]), 0.0);
        assert_eq!(balance(&db, usd[4]), 0.0);
        assert_eq!(balance(&db, rub[5]), 3200.0);
        assert_eq!(balance(&db, usd[5]), -50.0);
    }

    #[test]
    fn scenario_4_full_match_with_asymmetric_amounts() {
        let db = MockPersistence::new();
        let mut usd = vec![0i32; 5];
        let mut rub = vec![0i32; 5];
        for user_id in 1..=4 {
            let (u, r) = setup_user(&db, user_id);
            usd[user_id as usize] = u;
            rub[user_id as usize] = r;
        }

        db.make_request(1, "USD/RUB", 100.0, 62.0, OrderSide::Sell).unwrap();
        db.make_request(2, "USD/RUB", 50.0, 63.0, OrderSide::Buy).unwrap();
        db.make_request(3, "USD/RUB", 40.0, 64.0, OrderSide::Buy).unwrap();
        db.make_request(4, "USD/RUB", 50.0, 62.0, OrderSide::Buy).unwrap();

        Matcher::new(db.clone()).process_requests();

        assert_eq!(balance(&db, rub[1]), 6330.0);
        assert_eq!(balance(&db, usd[1]), -100.0);
        assert_eq!(balance(&db, rub[2]), -3150.0);
        assert_eq!(balance(&db, usd[2]), 50.0);
        assert_eq!(balance(&db, rub[3]), -2560.0);
        assert_eq!(balance(&db, usd[3]), 40.0);
        assert_eq!(balance(&db, rub[4]), -620.0);
        assert_eq!(balance(&db, usd[4]), 10.0);
    }

    #[test]
    fn scenario_5_partial_fill_mode() {
        let db = MockPersistence::new();
        let mut usd = vec![0i32; 4];
        let mut rub = vec![0i32; 4];
        for user_id in 1..=3 {
            let (u, r) = setup_user(&db, user_id);
            usd[user_id as usize] = u;
            rub[user_id as usize] = r;
        }

        db.make_request(1, "USD/RUB", 10.0, 62.0, OrderSide::Buy).unwrap();
        db.make_request(2, "USD/RUB", 20.0, 63.0, OrderSide::Buy).unwrap();
        db.make_request(3, "USD/RUB", 50.0, 61.0, OrderSide::Sell).unwrap();

        Matcher::new(db.clone()).process_requests();

        assert_eq!(balance(&db, rub[1]), -620.0);
        assert_eq!(balance(&db, usd[1]), 10.0);
        assert_eq!(balance(&db, rub[2]), -1260.0);
        assert_eq!(balance(&db, usd[2]), 20.0);
        assert_eq!(balance(&db, rub[3]), 1880.0);
        assert_eq!(balance(&db, usd[3]), -30.0);

        let remaining = db.list_open_buys().unwrap();
        assert!(remaining.is_empty(), "both buyers should be fully filled and deleted");

        // Both trades here are actually single-shot matches (seller 3's
        // order always has enough amount to fully cover whichever buyer
        // it's matched against), so the seller's order is updated down to
        // its final remainder rather than deleted.
        let seller_row = db.get_order(3).unwrap().expect("seller's order survives with a reduced amount");
        assert_eq!(seller_row.amount, 20.0);
    }

    #[test]
    fn unmatched_buy_is_left_open() {
        let db = MockPersistence::new();
        setup_user(&db, 1);
        setup_user(&db, 2);
        db.make_request(1, "USD/RUB", 50.0, 62.0, OrderSide::Buy).unwrap();
        db.make_request(2, "USD/RUB", 40.0, 70.0, OrderSide::Sell).unwrap();

        Matcher::new(db.clone()).process_requests();

        let open = db.list_open_buys().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].amount, 50.0);
    }
}
