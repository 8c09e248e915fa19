use redb::TableDefinition;

/// Key-value entries: key -> StoredEntry (msgpack)
pub const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Expiration index: "<expires_at_ms>:<key>" -> key
pub const ENTRY_EXPIRY: TableDefinition<&str, &str> = TableDefinition::new("entry_expiry");
