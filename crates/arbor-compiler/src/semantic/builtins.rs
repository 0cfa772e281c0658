//! Names of the standard functions known to the checker and interpreter

pub const SIZE: &str = "size";
pub const CONTAINS: &str = "contains";
pub const STARTS_WITH: &str = "startsWith";
pub const ENDS_WITH: &str = "endsWith";
pub const MATCHES: &str = "matches";
pub const INT: &str = "int";
pub const DOUBLE: &str = "double";
pub const STRING: &str = "string";
pub const DURATION: &str = "duration";
pub const TIMESTAMP: &str = "timestamp";

/// Every standard function name
pub const ALL: &[&str] = &[
    SIZE,
    CONTAINS,
    STARTS_WITH,
    ENDS_WITH,
    MATCHES,
    INT,
    DOUBLE,
    STRING,
    DURATION,
    TIMESTAMP,
];

pub fn is_builtin(name: &str) -> bool {
    ALL.contains(&name)
}
