//! Numeric constants shared with the client library.

// Column type codes (`enum_field_types`).
pub const TYPE_DECIMAL: u32 = 0;
pub const TYPE_TINY: u32 = 1;
pub const TYPE_SHORT: u32 = 2;
pub const TYPE_LONG: u32 = 3;
pub const TYPE_FLOAT: u32 = 4;
pub const TYPE_DOUBLE: u32 = 5;
pub const TYPE_NULL: u32 = 6;
pub const TYPE_TIMESTAMP: u32 = 7;
pub const TYPE_LONGLONG: u32 = 8;
pub const TYPE_INT24: u32 = 9;
pub const TYPE_DATE: u32 = 10;
pub const TYPE_TIME: u32 = 11;
pub const TYPE_DATETIME: u32 = 12;
pub const TYPE_YEAR: u32 = 13;
pub const TYPE_NEWDATE: u32 = 14;
pub const TYPE_VARCHAR: u32 = 15;
pub const TYPE_BIT: u32 = 16;
pub const TYPE_JSON: u32 = 245;
pub const TYPE_NEWDECIMAL: u32 = 246;
pub const TYPE_ENUM: u32 = 247;
pub const TYPE_SET: u32 = 248;
pub const TYPE_TINY_BLOB: u32 = 249;
pub const TYPE_MEDIUM_BLOB: u32 = 250;
pub const TYPE_LONG_BLOB: u32 = 251;
pub const TYPE_BLOB: u32 = 252;
pub const TYPE_VAR_STRING: u32 = 253;
pub const TYPE_STRING: u32 = 254;
pub const TYPE_GEOMETRY: u32 = 255;

// Column flags.
pub const NOT_NULL_FLAG: u32 = 1;
pub const PRI_KEY_FLAG: u32 = 2;
pub const UNIQUE_KEY_FLAG: u32 = 4;
pub const MULTIPLE_KEY_FLAG: u32 = 8;
pub const BLOB_FLAG: u32 = 16;
pub const UNSIGNED_FLAG: u32 = 32;
pub const ZEROFILL_FLAG: u32 = 64;
pub const BINARY_FLAG: u32 = 128;
pub const ENUM_FLAG: u32 = 256;
pub const AUTO_INCREMENT_FLAG: u32 = 512;
pub const TIMESTAMP_FLAG: u32 = 1024;
pub const SET_FLAG: u32 = 2048;

// Client capability flags.
pub const CLIENT_FOUND_ROWS: u64 = 2;

// Statement fetch return codes.
pub const FETCH_OK: i32 = 0;
pub const FETCH_ERROR: i32 = 1;
pub const MYSQL_NO_DATA: i32 = 100;
pub const MYSQL_DATA_TRUNCATED: i32 = 101;

// Protocol selection (`mysql_protocol_type`).
pub const PROTOCOL_DEFAULT: u32 = 0;
pub const PROTOCOL_TCP: u32 = 1;
pub const PROTOCOL_SOCKET: u32 = 2;
pub const PROTOCOL_PIPE: u32 = 3;
pub const PROTOCOL_MEMORY: u32 = 4;

// Server error codes.
pub const ER_ACCESS_DENIED_ERROR: u32 = 1045;
pub const ER_BAD_DB_ERROR: u32 = 1049;
pub const ER_PARSE_ERROR: u32 = 1064;
pub const ER_UNKNOWN_CHARACTER_SET: u32 = 1115;
pub const ER_LOCK_WAIT_TIMEOUT: u32 = 1205;
pub const ER_LOCK_DEADLOCK: u32 = 1213;

// Client error codes.
pub const CR_UNKNOWN_ERROR: u32 = 2000;
pub const CR_CONNECTION_ERROR: u32 = 2002;
pub const CR_CONN_HOST_ERROR: u32 = 2003;
pub const CR_SERVER_GONE_ERROR: u32 = 2006;
pub const CR_OUT_OF_MEMORY: u32 = 2008;
pub const CR_SERVER_LOST: u32 = 2013;
pub const CR_CANT_READ_CHARSET: u32 = 2019;
pub const CR_NO_PREPARE_STMT: u32 = 2030;
pub const CR_PARAMS_NOT_BOUND: u32 = 2031;
pub const CR_NO_DATA: u32 = 2051;

/// Client error codes that mean the link to the server is unusable.
pub fn is_connection_error(code: u32) -> bool {
    matches!(
        code,
        CR_CONNECTION_ERROR | CR_CONN_HOST_ERROR | CR_SERVER_GONE_ERROR | CR_SERVER_LOST
    )
}
