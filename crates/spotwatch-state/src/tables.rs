//! redb table definitions for the price observation store.

use redb::TableDefinition;

/// Price observations keyed by append sequence (0, 1, 2, ...).
///
/// Values are JSON-serialized `PriceObservation`s. The sequence carries no
/// meaning beyond uniqueness; rows are never updated or removed.
pub const OBSERVATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("observations");
