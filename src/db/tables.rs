use redb::TableDefinition;

/// Images table: image id -> ImageRow (serialized)
pub const IMAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("images");

/// Counters: name -> value
/// `last_image_id` and `last_created_ms` keep ids and creation times increasing,
/// even after the newest row is deleted
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const LAST_IMAGE_ID: &str = "last_image_id";
pub const LAST_CREATED_MS: &str = "last_created_ms";
