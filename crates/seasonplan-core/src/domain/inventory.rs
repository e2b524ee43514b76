//! Store inventory state and the DC stock resource.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::store::StoreId;

/// Per-store inventory position for the current week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryState {
    pub store_id: StoreId,
    pub on_hand: u64,
    pub cumulative_shipped: u64,
    pub cumulative_sold: u64,
}

impl InventoryState {
    /// Opening position after the initial shipment.
    pub fn opening(store_id: StoreId, initial_allocation: u64) -> Self {
        Self {
            store_id,
            on_hand: initial_allocation,
            cumulative_shipped: initial_allocation,
            cumulative_sold: 0,
        }
    }

    /// Receive a shipment.
    pub fn receive(&mut self, units: u64) {
        self.on_hand += units;
        self.cumulative_shipped += units;
    }

    /// Record a week of sales; returns the units actually deducted.
    ///
    /// Sales beyond on-hand are capped so stock never goes negative.
    pub fn record_sales(&mut self, units: u64) -> u64 {
        let sold = units.min(self.on_hand);
        self.on_hand -= sold;
        self.cumulative_sold += sold;
        sold
    }
}

/// Uncommitted units at the distribution center.
///
/// Planners take `&mut DcPool`, so a single planning pass is the only writer
/// for its duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcPool {
    available: u64,
}

impl DcPool {
    pub fn new(available: u64) -> Self {
        Self { available }
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    /// Take up to `requested` units; returns the units granted.
    pub fn withdraw(&mut self, requested: u64) -> u64 {
        let granted = requested.min(self.available);
        self.available -= granted;
        granted
    }

    /// Return units to the pool, e.g. cancelled orders or inbound receipts.
    pub fn restock(&mut self, units: u64) {
        self.available += units;
    }
}

/// A [`DcPool`] shared by planners running on different threads.
#[derive(Debug, Clone)]
pub struct SharedDcPool {
    inner: Arc<Mutex<DcPool>>,
}

impl SharedDcPool {
    pub fn new(pool: DcPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Run one planning pass with exclusive access to the pool.
    pub fn with_pass<T>(&self, pass: impl FnOnce(&mut DcPool) -> T) -> T {
        // A panic inside another pass leaves the counter itself consistent.
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        pass(&mut guard)
    }

    pub fn available(&self) -> u64 {
        self.with_pass(|pool| pool.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_never_exceeds_available() {
        let mut pool = DcPool::new(50);
        assert_eq!(pool.withdraw(30), 30);
        assert_eq!(pool.withdraw(30), 20);
        assert_eq!(pool.withdraw(5), 0);
        assert_eq!(pool.available(), 0);
        pool.restock(7);
        assert_eq!(pool.available(), 7);
    }

    #[test]
    fn test_record_sales_caps_at_on_hand() {
        let mut inv = InventoryState::opening(StoreId::new("S1"), 10);
        assert_eq!(inv.record_sales(4), 4);
        assert_eq!(inv.record_sales(9), 6);
        assert_eq!(inv.on_hand, 0);
        assert_eq!(inv.cumulative_sold, 10);
        inv.receive(5);
        assert_eq!(inv.on_hand, 5);
        assert_eq!(inv.cumulative_shipped, 15);
    }

    #[test]
    fn test_shared_pool_serializes_passes() {
        let shared = SharedDcPool::new(DcPool::new(1_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = shared.clone();
                std::thread::spawn(move || pool.with_pass(|p| p.withdraw(200)))
            })
            .collect();
        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 1_000);
        assert_eq!(shared.available(), 0);
    }
}
