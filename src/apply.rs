// src/apply.rs
//! Routes decoded events to per-symbol books.
//!
//! Execute/cancel/delete/replace messages carry no symbol, so the market
//! keeps an `order id -> symbol` table populated by adds. Replace routes
//! through the old id and re-keys the mapping to the new id.

use hashbrown::HashMap;

use crate::book::{Book, LevelView};
use crate::event::{Event, Side};
use crate::symbols::SymbolId;

/// Per-symbol snapshot produced at shutdown.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SymbolDepth {
    #[serde(rename = "symbol_id")]
    pub symbol: SymbolId,
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

/// The set of books for one pipeline, plus order-to-symbol routing.
///
/// New symbols get a clone of the template book, so one `Market` can run
/// either engine with per-mode sizing.
pub struct Market<B: Book + Clone> {
    template: B,
    books: HashMap<SymbolId, B>,
    order_symbols: HashMap<u64, SymbolId>,
}

impl<B: Book + Clone> Market<B> {
    pub fn new(template: B) -> Self {
        Self {
            template,
            books: HashMap::new(),
            order_symbols: HashMap::new(),
        }
    }

    /// Applies one event. Returns `false` when the event was ignored
    /// (unknown symbol id 0, or an order id this market never saw).
    pub fn apply(&mut self, ev: &Event) -> bool {
        match *ev {
            Event::Add {
                id,
                side,
                qty,
                price,
                symbol,
            } => {
                if symbol == 0 {
                    return false;
                }
                self.book_mut(symbol).add_order(id, side, qty, price);
                self.order_symbols.insert(id, symbol);
                true
            }
            Event::Exec { id, qty } | Event::Cancel { id, qty } => {
                let Some(&symbol) = self.order_symbols.get(&id) else {
                    return false;
                };
                self.book_mut(symbol).execute_order(id, qty);
                true
            }
            Event::Delete { id } => {
                let Some(symbol) = self.order_symbols.remove(&id) else {
                    return false;
                };
                self.book_mut(symbol).delete_order(id);
                true
            }
            Event::Replace {
                old_id,
                new_id,
                qty,
                price,
                ..
            } => {
                let Some(symbol) = self.order_symbols.remove(&old_id) else {
                    return false;
                };
                self.book_mut(symbol).replace_order(old_id, new_id, qty, price);
                self.order_symbols.insert(new_id, symbol);
                true
            }
        }
    }

    fn book_mut(&mut self, symbol: SymbolId) -> &mut B {
        let template = &self.template;
        self.books
            .entry(symbol)
            .or_insert_with(|| template.clone())
    }

    pub fn book(&self, symbol: SymbolId) -> Option<&B> {
        self.books.get(&symbol)
    }

    pub fn symbol_count(&self) -> usize {
        self.books.len()
    }

    /// Top `n` levels per side for every symbol, ordered by symbol id.
    pub fn snapshot(&self, n: usize) -> Vec<SymbolDepth> {
        let mut ids: Vec<SymbolId> = self.books.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .map(|symbol| {
                let book = &self.books[&symbol];
                SymbolDepth {
                    symbol,
                    bids: book.depth(Side::Bid, n),
                    asks: book.depth(Side::Ask, n),
                }
            })
            .collect()
    }
}
