//! Sale state machine for properties.
//!
//! A property is `Available`, `PreSold(client)` or `Sold(client)`. Each mutator sets
//! both flags explicitly, so `sold && pre_vendido` never holds after any call,
//! including when two writers race on the same property.
//! Mutators return `true` when they changed something.

use serde::Serialize;

use super::domain::{ClientId, Property};

/// Derived view of a property's sale fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "client", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleState {
    Available,
    PreSold(Option<ClientId>),
    Sold(Option<ClientId>),
}

impl Property {
    pub fn sale_state(&self) -> SaleState {
        if self.sold {
            SaleState::Sold(self.sold_client)
        } else if self.pre_vendido {
            SaleState::PreSold(self.pre_vendido_client)
        } else {
            SaleState::Available
        }
    }

    /// Final sale to `client`. Allowed from any state; the last writer wins.
    pub fn set_sold(&mut self, client: ClientId) -> bool {
        let changed = !self.sold
            || self.sold_client != Some(client)
            || self.pre_vendido
            || self.pre_vendido_client.is_some();
        self.sold = true;
        self.sold_client = Some(client);
        self.pre_vendido = false;
        self.pre_vendido_client = None;
        changed
    }

    /// Reserve for `client`. Never applies to a sold property.
    pub fn set_pre_sold(&mut self, client: ClientId) -> bool {
        if self.sold {
            return false;
        }
        let changed = !self.pre_vendido || self.pre_vendido_client != Some(client);
        self.pre_vendido = true;
        self.pre_vendido_client = Some(client);
        changed
    }

    /// Undo a sale. The reservation fields are left alone.
    pub fn release(&mut self) -> bool {
        let changed = self.sold || self.sold_client.is_some();
        self.sold = false;
        self.sold_client = None;
        changed
    }

    /// Explicit reservation toggle. Turning it on also clears any sale.
    pub fn toggle_pre_sold(&mut self, client: ClientId, pre_sold: bool) -> bool {
        if pre_sold {
            let released = self.release();
            let reserved = self.set_pre_sold(client);
            released || reserved
        } else {
            let changed = self.pre_vendido || self.pre_vendido_client.is_some();
            self.pre_vendido = false;
            self.pre_vendido_client = None;
            changed
        }
    }

    /// Explicit sale toggle used by the catalog.
    pub fn toggle_sold(&mut self, client: ClientId, sold: bool) -> bool {
        if sold {
            self.set_sold(client)
        } else {
            self.release()
        }
    }
}
