pub mod uploads;

pub use uploads::{detect_content_type, StoredDocument, UploadCleanup, UploadStore};
