pub mod batch;
pub mod container;
pub mod error;
pub mod format;
pub mod image;
pub mod io;
pub mod metadata;
pub mod payload;
pub mod validate;

pub use batch::{run_batch, BatchItem, BatchOptions, BatchReport, ItemOutcome};
pub use container::{decode, encode, inspect, ContainerInfo, Decoded, EncodeOptions};
pub use error::{Error, FormatError, InputError, Result};
pub use format::{CONTAINER_VERSION, EXTENSION, MAGIC};
pub use metadata::{Metadata, Value};
pub use payload::PayloadCodec;
pub use validate::{validate, ValidationReport};
