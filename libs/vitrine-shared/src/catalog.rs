use serde::{Deserialize, Serialize};

use crate::Amount;

/// One sellable catalog entry: a platform whose verification SMS can be
/// received through a rented number.
///
/// The catalog is edited by the admin panel and reaches the engine through
/// the settings store under the `services` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    /// Final price charged to the customer.
    pub price: Amount,
    /// Numbers currently available at the rental provider.
    pub stock: u32,
}
