pub mod error;
pub mod record;
pub mod timestamp;

pub use error::{DbError, Result};
pub use record::{
    BASE_FIELDS, CLASS_FIELD, CREATED_AT_FIELD, ID_FIELD, Record, UPDATED_AT_FIELD,
    is_reserved_field,
};
pub use timestamp::{TIMESTAMP_FORMAT, format_timestamp, parse_timestamp};
