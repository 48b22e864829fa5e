use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::{Order, ResultIdentity};

pub const UNKNOWN_REVISION: &str = "unknown";

/// Values recorded under one order, keyed by identity.
pub type OrderEntries = BTreeMap<ResultIdentity, Option<f64>>;

/// `order -> identity -> value` for one source. Later writes for the same
/// (order, identity) replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementTable {
    orders: BTreeMap<Order, OrderEntries>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns the value it replaced, if any.
    pub fn insert(
        &mut self,
        order: Order,
        identity: ResultIdentity,
        value: Option<f64>,
    ) -> Option<Option<f64>> {
        self.orders.entry(order).or_default().insert(identity, value)
    }

    pub fn entries(&self, order: Order) -> Option<&OrderEntries> {
        self.orders.get(&order)
    }

    pub fn contains_order(&self, order: Order) -> bool {
        self.orders.contains_key(&order)
    }

    pub fn min_order(&self) -> Option<Order> {
        self.orders.keys().next().copied()
    }

    /// Orders in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Order, &OrderEntries)> {
        self.orders.iter().map(|(order, entries)| (*order, entries))
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn value_count(&self) -> usize {
        self.orders.values().map(BTreeMap::len).sum()
    }
}

/// `order -> revision` lookup, filled from the task-runner history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionIndex {
    revisions: BTreeMap<Order, String>,
}

impl RevisionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, order: Order, revision: impl Into<String>) {
        self.revisions.insert(order, revision.into());
    }

    pub fn get(&self, order: Order) -> Option<&str> {
        self.revisions.get(&order).map(String::as_str)
    }

    /// Revision for `order`, or [`UNKNOWN_REVISION`] when it was never registered.
    pub fn resolve(&self, order: Order) -> &str {
        self.get(order).unwrap_or(UNKNOWN_REVISION)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}
