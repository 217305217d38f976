//! Sort order definitions

use serde::{Deserialize, Serialize};

use crate::criteria::SEQ_ID_FIELD;

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderField {
    /// Logical field name (same vocabulary as criteria fields)
    pub field: String,
    /// Ascending if true
    pub ascending: bool,
}

/// Ordered list of sort keys; empty means "no ordering requested"
///
/// # Examples
///
/// ```
/// use docstore_core::OrderDef;
///
/// let order = OrderDef::new().asc("last_name").desc("age");
/// assert_eq!(order.fields().len(), 2);
/// assert!(!order.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OrderDef {
    fields: Vec<OrderField>,
}

impl OrderDef {
    /// Empty order
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending key
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push(OrderField {
            field: field.into(),
            ascending: true,
        });
        self
    }

    /// Append a descending key
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push(OrderField {
            field: field.into(),
            ascending: false,
        });
        self
    }

    /// Order purely by sequence id ascending
    pub fn by_seq_id() -> Self {
        Self::new().asc(SEQ_ID_FIELD)
    }

    /// Sort keys in priority order
    pub fn fields(&self) -> &[OrderField] {
        &self.fields
    }

    /// True if no ordering was requested
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<OrderField>> for OrderDef {
    fn from(fields: Vec<OrderField>) -> Self {
        OrderDef { fields }
    }
}
