//! # entimap Codec
//!
//! Database values and conversions between Rust types and column values.
//!
//! Every value that crosses the connection boundary (bound parameters,
//! reader columns, identity values) is a [`Value`]. Entity property types
//! convert to values through `From<T> for Value` and back through
//! [`FromValue`].
//!
//! ## Conversion Rules
//!
//! - Integers narrow with range checks (`OutOfRange` instead of wrapping)
//! - Integral floats and numeric text convert to integers (drivers report
//!   identity values as `numeric`)
//! - `Null` only converts into `Option<T>`
//! - Strings accept any scalar except bytes
//!
//! ## Usage
//!
//! ```
//! use entimap_codec::{FromValue, Value};
//!
//! let value = Value::from(42i32);
//! let back = i64::from_value(&value).unwrap();
//! assert_eq!(back, 42);
//!
//! let missing: Option<String> = FromValue::from_value(&Value::Null).unwrap();
//! assert!(missing.is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod convert;
mod error;
mod value;

pub use convert::FromValue;
pub use error::{CodecError, CodecResult};
pub use value::Value;
