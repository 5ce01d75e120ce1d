/// Maximum upload size in bytes (10MB)
pub const MAX_UPLOAD_SIZE_BYTES: usize = 10_485_760;

/// Extra request body allowance for multipart boundaries and part headers
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Cache lifetime sent with every stored object, in seconds
pub const OBJECT_CACHE_CONTROL_SECS: u32 = 3600;

/// Default object storage bucket
pub const DEFAULT_BUCKET: &str = "images";

/// Default metadata table
pub const DEFAULT_IMAGES_TABLE: &str = "images";

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD_NAME: &str = "file";

// =============================================================================
// Error Messages
// =============================================================================

/// Error message for a missing or empty file name
pub const ERR_MISSING_FILE_NAME: &str = "File name must not be empty";

/// Error message for an empty upload
pub const ERR_EMPTY_FILE: &str = "File must not be empty";

/// Error message for non-image uploads
pub const ERR_NOT_AN_IMAGE: &str = "Only image files can be uploaded";

/// Error message for storage keys that would escape the bucket
pub const ERR_INVALID_STORAGE_KEY: &str = "Invalid storage key";
