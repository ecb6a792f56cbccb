//! Every coin ever minted, in mint order, indexed by identity hash.

use coinchain_core::{Coin, Hash};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Circulation {
    coins: Vec<Coin>,
    index: HashMap<Hash, usize>,
}

impl Circulation {
    /// A circulation holding only the genesis coin.
    pub fn new() -> Self {
        let genesis = Coin::genesis();
        Self {
            index: HashMap::from([(genesis.hash, 0)]),
            coins: vec![genesis],
        }
    }

    /// Rebuild from a list of coins. Returns the first repeated hash on
    /// failure.
    pub fn from_coins(coins: Vec<Coin>) -> Result<Self, Hash> {
        let mut index = HashMap::with_capacity(coins.len());
        for (position, coin) in coins.iter().enumerate() {
            if index.insert(coin.hash, position).is_some() {
                return Err(coin.hash);
            }
        }
        Ok(Self { coins, index })
    }

    /// Append a freshly minted coin.
    pub fn push(&mut self, coin: Coin) {
        self.index.insert(coin.hash, self.coins.len());
        self.coins.push(coin);
    }

    pub fn get(&self, hash: &Hash) -> Option<&Coin> {
        self.index.get(hash).map(|&position| &self.coins[position])
    }

    pub fn get_mut(&mut self, hash: &Hash) -> Option<&mut Coin> {
        self.index.get(hash).map(|&position| &mut self.coins[position])
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    /// Most recently minted coin.
    pub fn last(&self) -> Option<&Coin> {
        self.coins.last()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.coins.iter()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.coins
    }
}

impl Default for Circulation {
    fn default() -> Self {
        Self::new()
    }
}
