// order_book/mod.rs
// The persistent store of open buy/sell limit orders. Mutation and simple
// CRUD only; the matching algorithm itself lives in `crate::matcher`.

use colored::Colorize;
use database::{OrderSide, Persistence};

use crate::error::StorageError;

#[derive(Debug)]
pub struct OrderBook<P: Persistence> {
    persistence: P,
}

impl<P: Persistence> OrderBook<P> {
    pub fn new(persistence: P) -> Self {
        Self { persistence }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn make_request(
        &self,
        user_id: i32,
        pair: &str,
        amount: f32,
        price: f32,
        side: OrderSide,
    ) -> Result<bool, StorageError> {
        Ok(self.persistence.make_request(user_id, pair, amount, price, side)?)
    }

    pub fn remove_request(&self, order_id: i32) -> Result<bool, StorageError> {
        Ok(self.persistence.remove_request(order_id)?)
    }

    /// Debug aid for interactive runs; prints the open Buy side in price
    /// descending / id ascending order, colored the way a trade book
    /// printout conventionally is.
    pub fn print_open_buys(&self) -> Result<(), StorageError> {
        let buys = self.persistence.list_open_buys()?;
        println!("{}", "Open buys:".bold().white());
        for order in buys {
            println!(
                "{} {} , {} {} , {} {}",
                "id:".green(),
                order.id,
                "price:".green(),
                order.price,
                "amount:".green(),
                order.amount,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::MockPersistence;

    #[test]
    fn make_request_then_remove_request_leaves_no_rows() {
        let book = OrderBook::new(MockPersistence::new());
        book.make_request(1, "USD/RUB", 50.0, 62.0, OrderSide::Buy).unwrap();
        let order = book.persistence().list_open_buys().unwrap();
        assert_eq!(order.len(), 1);
        assert!(book.remove_request(order[0].id).unwrap());
        assert!(book.persistence().list_open_buys().unwrap().is_empty());
    }
}
