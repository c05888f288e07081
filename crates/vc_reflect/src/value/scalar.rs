//! Little-endian codec of basic-type values.

use alloc::vec::Vec;

use crate::basic::{BasicType, ScalarKind};
use crate::value::Value;

impl ScalarKind {
    /// The zero value of this component type.
    pub const fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::I8 => Value::I8(0),
            Self::U8 => Value::U8(0),
            Self::I16 => Value::I16(0),
            Self::U16 => Value::U16(0),
            Self::I32 => Value::I32(0),
            Self::U32 => Value::U32(0),
            Self::I64 => Value::I64(0),
            Self::U64 => Value::U64(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
        }
    }

    /// Writes `value` into `out[..self.byte_size()]`.
    ///
    /// Returns `false` if `value` is not of this component type.
    pub fn encode(self, value: &Value, out: &mut [u8]) -> bool {
        let out = &mut out[..self.byte_size()];
        match (self, value) {
            (Self::Bool, Value::Bool(v)) => out[0] = *v as u8,
            (Self::I8, Value::I8(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::U8, Value::U8(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::I16, Value::I16(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::U16, Value::U16(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::I32, Value::I32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::U32, Value::U32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::I64, Value::I64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::U64, Value::U64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::F32, Value::F32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (Self::F64, Value::F64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            _ => return false,
        }
        true
    }

    /// Reads a value from `bytes[..self.byte_size()]`.
    pub fn decode(self, bytes: &[u8]) -> Value {
        let mut raw = [0_u8; 8];
        raw[..self.byte_size()].copy_from_slice(&bytes[..self.byte_size()]);
        let [a, b, c, d, ..] = raw;
        match self {
            Self::Bool => Value::Bool(a != 0),
            Self::I8 => Value::I8(a as i8),
            Self::U8 => Value::U8(a),
            Self::I16 => Value::I16(i16::from_le_bytes([a, b])),
            Self::U16 => Value::U16(u16::from_le_bytes([a, b])),
            Self::I32 => Value::I32(i32::from_le_bytes([a, b, c, d])),
            Self::U32 => Value::U32(u32::from_le_bytes([a, b, c, d])),
            Self::I64 => Value::I64(i64::from_le_bytes(raw)),
            Self::U64 => Value::U64(u64::from_le_bytes(raw)),
            Self::F32 => Value::F32(f32::from_le_bytes([a, b, c, d])),
            Self::F64 => Value::F64(f64::from_le_bytes(raw)),
        }
    }

    /// Converts a numeric value to this component type.
    ///
    /// Integers wrap, floats saturate, like an `as` cast.
    pub fn convert(self, value: &Value) -> Option<Value> {
        if let (Some(integer), false) = (value.as_i128(), matches!(value, Value::F32(_) | Value::F64(_))) {
            return Some(match self {
                Self::Bool => Value::Bool(integer != 0),
                Self::I8 => Value::I8(integer as i8),
                Self::U8 => Value::U8(integer as u8),
                Self::I16 => Value::I16(integer as i16),
                Self::U16 => Value::U16(integer as u16),
                Self::I32 => Value::I32(integer as i32),
                Self::U32 => Value::U32(integer as u32),
                Self::I64 => Value::I64(integer as i64),
                Self::U64 => Value::U64(integer as u64),
                Self::F32 => Value::F32(integer as f32),
                Self::F64 => Value::F64(integer as f64),
            });
        }
        let float = value.as_f64()?;
        Some(match self {
            Self::Bool => Value::Bool(float != 0.0),
            Self::I8 => Value::I8(float as i8),
            Self::U8 => Value::U8(float as u8),
            Self::I16 => Value::I16(float as i16),
            Self::U16 => Value::U16(float as u16),
            Self::I32 => Value::I32(float as i32),
            Self::U32 => Value::U32(float as u32),
            Self::I64 => Value::I64(float as i64),
            Self::U64 => Value::U64(float as u64),
            Self::F32 => Value::F32(float as f32),
            Self::F64 => Value::F64(float),
        })
    }
}

impl BasicType {
    /// The zero value: a scalar, or an array of zero components.
    pub fn zero_value(self) -> Value {
        let scalar = self.scalar();
        match self.components() {
            1 => scalar.zero(),
            count => Value::Array((0..count).map(|_| scalar.zero()).collect()),
        }
    }

    /// Writes `value` into `out[..self.byte_size()]`.
    ///
    /// Returns `false` if the value does not have the shape of this type.
    pub fn encode(self, value: &Value, out: &mut [u8]) -> bool {
        let scalar = self.scalar();
        match (self.components(), value) {
            (0, _) => false,
            (1, value) => scalar.encode(value, out),
            (count, Value::Array(items)) if items.len() == count => items
                .iter()
                .zip(out.chunks_exact_mut(scalar.byte_size()))
                .all(|(item, chunk)| scalar.encode(item, chunk)),
            _ => false,
        }
    }

    /// Reads a value from `bytes[..self.byte_size()]`.
    pub fn decode(self, bytes: &[u8]) -> Value {
        let scalar = self.scalar();
        match self.components() {
            1 => scalar.decode(bytes),
            count => Value::Array(
                bytes
                    .chunks_exact(scalar.byte_size())
                    .take(count)
                    .map(|chunk| scalar.decode(chunk))
                    .collect(),
            ),
        }
    }

    /// Converts a value of basic type `from` to this type, component-wise.
    ///
    /// Missing components become zero, surplus components are dropped.
    pub fn convert_from(self, from: BasicType, value: &Value) -> Option<Value> {
        if from == self {
            return Some(value.clone());
        }
        let scalar = self.scalar();
        let components: Vec<&Value> = match (from.components(), value) {
            (1, value) => alloc::vec![value],
            (_, Value::Array(items)) => items.iter().collect(),
            _ => return None,
        };
        match self.components() {
            1 => scalar.convert(components.first()?),
            count => {
                let mut items = Vec::with_capacity(count);
                for index in 0..count {
                    items.push(match components.get(index) {
                        Some(component) => scalar.convert(component)?,
                        None => scalar.zero(),
                    });
                }
                Some(Value::Array(items))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use crate::basic::{BasicType, ScalarKind};
    use crate::value::Value;

    #[test]
    fn vector_codec() {
        let value = Value::Array(vec![Value::F32(1.0), Value::F32(-2.5), Value::F32(3.0)]);
        let mut out = [0_u8; 12];
        assert!(BasicType::Float3.encode(&value, &mut out));
        assert_eq!(&out[4..8], &(-2.5_f32).to_le_bytes());
        assert_eq!(BasicType::Float3.decode(&out), value);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut out = [0_u8; 8];
        assert!(!BasicType::Int32.encode(&Value::U32(1), &mut out));
        assert!(!BasicType::Int2.encode(&Value::Array(vec![Value::I32(1)]), &mut out));
    }

    #[test]
    fn conversions() {
        assert_eq!(ScalarKind::F32.convert(&Value::I32(3)), Some(Value::F32(3.0)));
        assert_eq!(ScalarKind::I16.convert(&Value::F64(7.9)), Some(Value::I16(7)));
        assert_eq!(ScalarKind::U8.convert(&Value::I32(257)), Some(Value::U8(1)));
        assert_eq!(ScalarKind::I32.convert(&Value::String("x".into())), None);

        let widened = BasicType::Float4
            .convert_from(BasicType::Int2, &Value::Array(vec![Value::I32(1), Value::I32(2)]))
            .unwrap();
        assert_eq!(
            widened,
            Value::Array(vec![Value::F32(1.0), Value::F32(2.0), Value::F32(0.0), Value::F32(0.0)])
        );
    }
}
