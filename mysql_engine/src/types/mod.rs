pub mod field;

pub use field::Field;

use crate::native::codes;
use serde::Serialize;

/// Logical column category derived from the native column type code.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    Int = 0,
    Float = 1,
    String = 2,
    Set = 3,
    Enum = 4,
    DateTime = 5,
    Date = 6,
    Time = 7,
    Year = 8,
    Timestamp = 9,
    Unknown = 10,
    Int64 = 11,
    Blob = 12,
    Decimal = 13,
}

impl FieldType {
    /// Total mapping; codes outside the table resolve to `Unknown`.
    pub fn from_native(type_code: u32) -> Self {
        match type_code {
            codes::TYPE_DECIMAL | codes::TYPE_NEWDECIMAL => Self::Decimal,
            codes::TYPE_TINY | codes::TYPE_SHORT | codes::TYPE_LONG | codes::TYPE_INT24 => {
                Self::Int
            }
            codes::TYPE_LONGLONG => Self::Int64,
            codes::TYPE_FLOAT | codes::TYPE_DOUBLE => Self::Float,
            codes::TYPE_NULL
            | codes::TYPE_VARCHAR
            | codes::TYPE_VAR_STRING
            | codes::TYPE_STRING => Self::String,
            codes::TYPE_TIMESTAMP => Self::Timestamp,
            codes::TYPE_DATE => Self::Date,
            codes::TYPE_TIME => Self::Time,
            codes::TYPE_DATETIME => Self::DateTime,
            codes::TYPE_YEAR => Self::Year,
            codes::TYPE_ENUM => Self::Enum,
            codes::TYPE_SET => Self::Set,
            codes::TYPE_TINY_BLOB
            | codes::TYPE_MEDIUM_BLOB
            | codes::TYPE_LONG_BLOB
            | codes::TYPE_BLOB => Self::Blob,
            _ => Self::Unknown,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Int64 | Self::Float | Self::Decimal)
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::DateTime | Self::Date | Self::Time | Self::Year | Self::Timestamp
        )
    }
}
