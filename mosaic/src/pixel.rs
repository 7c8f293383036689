//! Pixel element types that can be stored in a chunked array.

use bytemuck::Pod;
use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Element type of a stored array, serialized with its Zarr v2 `dtype` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum DataType {
    #[serde(rename = "|u1")]
    #[strum(serialize = "uint8")]
    U8,
    #[serde(rename = "<u2")]
    #[strum(serialize = "uint16")]
    U16,
    #[serde(rename = "<u4")]
    #[strum(serialize = "uint32")]
    U32,
    #[serde(rename = "<f4")]
    #[strum(serialize = "float32")]
    F32,
    #[serde(rename = "<f8")]
    #[strum(serialize = "float64")]
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::U32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, DataType::U8 | DataType::U16 | DataType::U32)
    }
}

/// A plain-old-data pixel that can be written to and read from chunk bytes.
///
/// Chunks hold the native in-memory representation; all supported targets are
/// little-endian, which matches the `<` byte order recorded in array metadata.
pub trait Pixel:
    Pod + Default + NumCast + ToPrimitive + PartialEq + Send + Sync + std::fmt::Debug + 'static
{
    const DATA_TYPE: DataType;

    /// Converts an averaged value back to the pixel type.
    ///
    /// Integer types round to nearest; out-of-range values fall back to zero.
    #[inline]
    fn from_mean(value: f64) -> Self {
        let value = if Self::DATA_TYPE.is_integer() {
            value.round()
        } else {
            value
        };
        <Self as NumCast>::from(value).unwrap_or_default()
    }

    #[inline]
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or_default()
    }
}

impl Pixel for u8 {
    const DATA_TYPE: DataType = DataType::U8;
}

impl Pixel for u16 {
    const DATA_TYPE: DataType = DataType::U16;
}

impl Pixel for u32 {
    const DATA_TYPE: DataType = DataType::U32;
}

impl Pixel for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Pixel for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}
