pub mod image;
pub mod upload;
pub mod view;

pub use image::{ImageRecord, ImageRow, NewImageRecord, sort_newest_first};
pub use upload::FileUpload;
pub use view::{ImageCard, format_bytes, relative_time};
