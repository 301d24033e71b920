mod error;
mod traits;
mod types;

pub mod filesystem;

pub use error::StorageError;
pub use traits::{BinaryStore, BoxReader, ByteStream, UploadSink};
pub use types::{ByteRange, DEFAULT_CHUNK_SIZE, FileId, StoredFile, UploadOptions};
