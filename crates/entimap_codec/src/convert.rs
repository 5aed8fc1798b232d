//! Conversions from [`Value`] into Rust property types.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use uuid::Uuid;

/// Types that can be read out of a column value.
///
/// Implementations are lenient across representations a driver might pick
/// for the same column (an identity value may arrive as `numeric` text or as
/// an integral float) but never silently truncate.
pub trait FromValue: Sized {
    /// Name of the target type, reported in conversion errors.
    const TYPE_NAME: &'static str;

    /// Converts a value into `Self`.
    fn from_value(value: &Value) -> CodecResult<Self>;
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Integer(n) => Ok(*n),
            Value::Bool(b) => Ok(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            Value::Float(f) => {
                let in_range = *f >= i64::MIN as f64 && *f < i64::MAX as f64;
                if f.fract() == 0.0 && in_range {
                    Ok(*f as i64)
                } else {
                    Err(CodecError::out_of_range(Self::TYPE_NAME, f))
                }
            }
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| CodecError::invalid_text(Self::TYPE_NAME, e.to_string())),
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> CodecResult<Self> {
                    let wide = i64::from_value(value).map_err(|e| match e {
                        CodecError::TypeMismatch { found, .. } => {
                            CodecError::type_mismatch(Self::TYPE_NAME, found)
                        }
                        CodecError::OutOfRange { value, .. } => CodecError::OutOfRange {
                            target: Self::TYPE_NAME,
                            value,
                        },
                        CodecError::InvalidText { message, .. } => {
                            CodecError::invalid_text(Self::TYPE_NAME, message)
                        }
                    })?;
                    <$ty>::try_from(wide).map_err(|_| CodecError::out_of_range(Self::TYPE_NAME, wide))
                }
            }
        )*
    };
}

narrow_integer!(i32, i16, u32, u64);

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Integer(n) => Ok(*n != 0),
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(n) => Ok(*n as f64),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| CodecError::invalid_text(Self::TYPE_NAME, e.to_string())),
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_value(value: &Value) -> CodecResult<Self> {
        let wide = f64::from_value(value)
            .map_err(|_| CodecError::type_mismatch(Self::TYPE_NAME, value.kind()))?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(CodecError::out_of_range(Self::TYPE_NAME, wide));
        }
        #[allow(clippy::cast_possible_truncation)]
        let narrow = wide as f32;
        Ok(narrow)
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Bool(_) | Value::Uuid(_) => {
                Ok(value.to_string())
            }
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

impl FromValue for Uuid {
    const TYPE_NAME: &'static str = "Uuid";

    fn from_value(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s.trim())
                .map_err(|e| CodecError::invalid_text(Self::TYPE_NAME, e.to_string())),
            Value::Bytes(b) => Uuid::from_slice(b)
                .map_err(|_| CodecError::out_of_range(Self::TYPE_NAME, value)),
            other => Err(CodecError::type_mismatch(Self::TYPE_NAME, other.kind())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: &Value) -> CodecResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integers_narrow_with_range_checks() {
        assert_eq!(i32::from_value(&Value::Integer(7)).unwrap(), 7);
        let err = i32::from_value(&Value::Integer(i64::from(i32::MAX) + 1)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "i32", .. }));
        let err = u32::from_value(&Value::Integer(-1)).unwrap_err();
        assert_eq!(err.target(), "u32");
    }

    #[test]
    fn identity_representations_convert_to_integers() {
        // SCOPE_IDENTITY() is numeric; drivers surface it as text or float.
        assert_eq!(i64::from_value(&Value::Text("15".into())).unwrap(), 15);
        assert_eq!(i32::from_value(&Value::Float(15.0)).unwrap(), 15);
        assert!(i64::from_value(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn floats_at_the_integer_edge_do_not_saturate() {
        // i64::MAX as f64 rounds up to 2^63, one past the largest i64.
        let two_pow_63 = 9_223_372_036_854_775_808.0_f64;
        let err = i64::from_value(&Value::Float(two_pow_63)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "i64", .. }));
        assert_eq!(
            i64::from_value(&Value::Float(-two_pow_63)).unwrap(),
            i64::MIN
        );
        assert_eq!(
            i64::from_value(&Value::Float(9_007_199_254_740_992.0)).unwrap(),
            1 << 53
        );
    }

    #[test]
    fn null_only_converts_into_option() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_value(&Value::Integer(3)).unwrap(),
            Some(3)
        );
        let err = i32::from_value(&Value::Null).unwrap_err();
        assert_eq!(err, CodecError::type_mismatch("i32", "null"));
    }

    #[test]
    fn strings_accept_scalars() {
        assert_eq!(String::from_value(&Value::Integer(4)).unwrap(), "4");
        assert_eq!(String::from_value(&Value::Text("x".into())).unwrap(), "x");
        assert!(String::from_value(&Value::Bytes(vec![1])).is_err());
    }

    #[test]
    fn bools_accept_bits() {
        assert!(bool::from_value(&Value::Integer(1)).unwrap());
        assert!(!bool::from_value(&Value::Integer(0)).unwrap());
        assert!(bool::from_value(&Value::Text("yes".into())).is_err());
    }

    #[test]
    fn uuids_parse_from_text_and_bytes() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_value(&Value::Text(id.to_string())).unwrap(), id);
        assert_eq!(
            Uuid::from_value(&Value::Bytes(id.as_bytes().to_vec())).unwrap(),
            id
        );
        assert!(Uuid::from_value(&Value::Text("nope".into())).is_err());
    }

    #[test]
    fn text_mismatch_names_target() {
        let err = f64::from_value(&Value::Text("abc".into())).unwrap_err();
        assert!(matches!(err, CodecError::InvalidText { target: "f64", .. }));
    }

    proptest! {
        #[test]
        fn i32_values_survive_widening(n in any::<i32>()) {
            let value = Value::from(n);
            prop_assert_eq!(i32::from_value(&value).unwrap(), n);
            prop_assert_eq!(i64::from_value(&value).unwrap(), i64::from(n));
        }
    }
}
