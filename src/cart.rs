use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{Mutex, OwnedMutexGuard, RwLock},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// How long a session may stay idle before its cart is dropped.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Opaque identifier of a shopper session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: String,
    pub title: String,
    pub quantity: i32,
    /// Unit price in minor currency units, captured when the item was added.
    pub unit_price: i64,
    pub subtotal: i64,
}

/// Immutable view of a cart, lines in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub total: i64,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("unit_price must not be negative")]
    NegativePrice,
    #[error("Cart total would exceed the largest supported amount")]
    AmountTooLarge,
}

#[derive(Debug, Clone)]
struct Entry {
    product_id: String,
    title: String,
    quantity: i32,
    unit_price: i64,
    subtotal: i64,
}

fn line_subtotal(unit_price: i64, quantity: i32) -> Result<i64, CartError> {
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or(CartError::AmountTooLarge)
}

/// One shopper's cart.
///
/// Every stored entry has a quantity of at least 1 and a non-negative unit
/// price, and the total as well as every subtotal fit in an `i64`. A mutation
/// that would break this is refused and leaves the cart unchanged.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    entries: Vec<Entry>,
    total: i64,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `quantity` into an existing entry or appends a new one.
    ///
    /// The unit price and title of an existing entry are kept; an entry whose
    /// merged quantity drops to zero or below is removed.
    pub fn add(
        &mut self,
        product_id: &str,
        quantity: i32,
        unit_price: i64,
        title: &str,
    ) -> Result<(), CartError> {
        if unit_price < 0 {
            return Err(CartError::NegativePrice);
        }

        match self.position(product_id) {
            Some(idx) => {
                let merged = self.entries[idx].quantity.saturating_add(quantity);
                self.set_quantity(idx, merged)
            }
            None if quantity > 0 => {
                let subtotal = line_subtotal(unit_price, quantity)?;
                let total = self
                    .total
                    .checked_add(subtotal)
                    .ok_or(CartError::AmountTooLarge)?;
                self.entries.push(Entry {
                    product_id: product_id.to_string(),
                    title: title.to_string(),
                    quantity,
                    unit_price,
                    subtotal,
                });
                self.total = total;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Sets the quantity of an existing entry. Absent products are ignored.
    pub fn update(&mut self, product_id: &str, quantity: i32) -> Result<(), CartError> {
        match self.position(product_id) {
            Some(idx) => self.set_quantity(idx, quantity),
            None => Ok(()),
        }
    }

    pub fn remove(&mut self, product_id: &str) {
        if let Some(idx) = self.position(product_id) {
            self.total -= self.entries.remove(idx).subtotal;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        let lines = self
            .entries
            .iter()
            .map(|entry| CartLine {
                product_id: entry.product_id.clone(),
                title: entry.title.clone(),
                quantity: entry.quantity,
                unit_price: entry.unit_price,
                subtotal: entry.subtotal,
            })
            .collect();

        CartSnapshot {
            lines,
            total: self.total,
        }
    }

    fn set_quantity(&mut self, idx: usize, quantity: i32) -> Result<(), CartError> {
        if quantity <= 0 {
            self.total -= self.entries.remove(idx).subtotal;
            return Ok(());
        }

        let entry = &self.entries[idx];
        let subtotal = line_subtotal(entry.unit_price, quantity)?;
        let total = (self.total - entry.subtotal)
            .checked_add(subtotal)
            .ok_or(CartError::AmountTooLarge)?;

        let entry = &mut self.entries[idx];
        entry.quantity = quantity;
        entry.subtotal = subtotal;
        self.total = total;
        Ok(())
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.product_id == product_id)
    }
}

/// A session's cart plus when the session last used it.
#[derive(Debug)]
struct SessionCart {
    cart: Cart,
    touched: Instant,
    /// Set once the slot has been dropped from the store.
    detached: bool,
}

impl SessionCart {
    fn new() -> Self {
        Self {
            cart: Cart::new(),
            touched: Instant::now(),
            detached: false,
        }
    }

    fn is_idle(&self, ttl: Duration) -> bool {
        self.touched.elapsed() >= ttl
    }
}

type Slot = Arc<Mutex<SessionCart>>;

/// Carts of all live sessions.
///
/// Each session's cart sits behind its own mutex, so requests from the same
/// session are serialized while different sessions never contend. A session
/// that stays idle for longer than the store's TTL loses its cart.
#[derive(Debug, Clone)]
pub struct CartStore {
    carts: Arc<RwLock<HashMap<SessionId, Slot>>>,
    idle_ttl: Duration,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            carts: Arc::default(),
            idle_ttl,
        }
    }

    /// Number of sessions currently holding a cart.
    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.carts.read().await.is_empty()
    }

    /// Locks the session's cart if the session has one.
    ///
    /// A slot detached by `clear` or `evict_idle` while we waited for its lock
    /// is never handed out; the lookup is retried against the live map.
    async fn lock(&self, session: &SessionId) -> Option<OwnedMutexGuard<SessionCart>> {
        loop {
            let slot = self.carts.read().await.get(session).cloned()?;
            let mut guard = slot.lock_owned().await;
            if guard.detached {
                continue;
            }
            if guard.is_idle(self.idle_ttl) {
                debug!(%session, "Cart expired with its idle session");
                guard.cart.clear();
            }
            guard.touched = Instant::now();
            return Some(guard);
        }
    }

    async fn lock_or_create(&self, session: &SessionId) -> OwnedMutexGuard<SessionCart> {
        loop {
            if let Some(guard) = self.lock(session).await {
                return guard;
            }
            self.carts
                .write()
                .await
                .entry(*session)
                .or_insert_with(|| Arc::new(Mutex::new(SessionCart::new())));
        }
    }

    pub async fn add(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i32,
        unit_price: i64,
        title: &str,
    ) -> Result<CartSnapshot, CartError> {
        let mut slot = self.lock_or_create(session).await;
        slot.cart.add(product_id, quantity, unit_price, title)?;
        Ok(slot.cart.snapshot())
    }

    pub async fn update(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i32,
    ) -> Result<CartSnapshot, CartError> {
        let Some(mut slot) = self.lock(session).await else {
            return Ok(CartSnapshot::default());
        };
        slot.cart.update(product_id, quantity)?;
        Ok(slot.cart.snapshot())
    }

    pub async fn remove(&self, session: &SessionId, product_id: &str) -> CartSnapshot {
        let Some(mut slot) = self.lock(session).await else {
            return CartSnapshot::default();
        };
        slot.cart.remove(product_id);
        slot.cart.snapshot()
    }

    pub async fn snapshot(&self, session: &SessionId) -> CartSnapshot {
        match self.lock(session).await {
            Some(slot) => slot.cart.snapshot(),
            None => CartSnapshot::default(),
        }
    }

    /// Empties the session's cart and forgets the session.
    pub async fn clear(&self, session: &SessionId) {
        let slot = self.carts.write().await.remove(session);
        if let Some(slot) = slot {
            let mut slot = slot.lock().await;
            slot.cart.clear();
            slot.detached = true;
        }
    }

    /// Drops the carts of every session idle for at least the TTL and returns
    /// how many were dropped. Carts locked by an in-flight request are kept.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.idle_ttl;
        let mut carts = self.carts.write().await;
        let before = carts.len();
        carts.retain(|_, slot| match slot.try_lock() {
            Ok(mut slot) if slot.is_idle(ttl) => {
                slot.cart.clear();
                slot.detached = true;
                false
            }
            _ => true,
        });
        before - carts.len()
    }

    /// Runs `evict_idle` every `period` until the task is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    info!(evicted, "Dropped carts of idle sessions");
                }
            }
        })
    }
}
