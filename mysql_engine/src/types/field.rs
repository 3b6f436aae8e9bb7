use super::FieldType;
use crate::native::{codes, NativeField};
use serde::Serialize;

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub table: Option<String>,
    pub default: Option<String>,
    pub field_type: FieldType,
    /// Width of the longest value in the buffered result.
    pub max_length: u64,
    pub flags: u32,
    pub decimals: u32,
}

impl Field {
    pub fn is_not_null(&self) -> bool {
        self.flags & codes::NOT_NULL_FLAG != 0
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags & codes::PRI_KEY_FLAG != 0
    }

    pub fn is_unique_key(&self) -> bool {
        self.flags & codes::UNIQUE_KEY_FLAG != 0
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags & codes::UNSIGNED_FLAG != 0
    }

    pub fn is_binary(&self) -> bool {
        self.flags & codes::BINARY_FLAG != 0
    }

    pub fn is_auto_increment(&self) -> bool {
        self.flags & codes::AUTO_INCREMENT_FLAG != 0
    }
}

impl From<NativeField> for Field {
    fn from(native: NativeField) -> Self {
        Self {
            field_type: FieldType::from_native(native.type_code),
            name: native.name,
            table: native.table,
            default: native.default,
            max_length: native.max_length,
            flags: native.flags,
            decimals: native.decimals,
        }
    }
}
