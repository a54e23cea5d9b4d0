//! Type mapping between Oracle and PostgreSQL.

use tracing::warn;

/// Map an Oracle data type to its PostgreSQL equivalent.
///
/// `data_length` applies to character types, `data_precision` and
/// `data_scale` to NUMBER and the fractional-seconds precision of
/// timestamps, all as reported by `all_tab_columns`. Unknown types fall
/// back to TEXT; the fallback is logged, not an error.
pub fn oracle_to_postgres(
    oracle_type: &str,
    data_length: Option<u32>,
    data_precision: Option<u32>,
    data_scale: Option<i32>,
) -> String {
    let upper = oracle_type.trim().to_uppercase();

    // Oracle reports timestamps as e.g. "TIMESTAMP(6)" or
    // "TIMESTAMP(6) WITH TIME ZONE"; the fractional-seconds precision
    // also shows up as data_scale.
    if upper.starts_with("TIMESTAMP") {
        if upper.contains("WITH LOCAL TIME ZONE") {
            return "TIMESTAMP".to_string();
        }
        if upper.contains("WITH TIME ZONE") {
            return "TIMESTAMP WITH TIME ZONE".to_string();
        }
        return match data_scale {
            Some(scale) if scale > 0 => format!("TIMESTAMP({})", scale),
            _ => "TIMESTAMP".to_string(),
        };
    }

    if upper.starts_with("INTERVAL") {
        return "INTERVAL".to_string();
    }

    match upper.as_str() {
        "NUMBER" => match data_precision {
            None => "NUMERIC".to_string(),
            Some(precision) => match data_scale {
                None | Some(0) => {
                    if precision <= 4 {
                        "SMALLINT".to_string()
                    } else if precision <= 9 {
                        "INTEGER".to_string()
                    } else if precision <= 18 {
                        "BIGINT".to_string()
                    } else {
                        format!("NUMERIC({})", precision)
                    }
                }
                Some(scale) => format!("NUMERIC({},{})", precision, scale),
            },
        },

        "VARCHAR2" | "NVARCHAR2" | "VARCHAR" => match data_length.filter(|l| *l > 0) {
            // PostgreSQL VARCHAR maxes out at 10485760
            Some(length) => format!("VARCHAR({})", length.min(10_485_760)),
            None => "VARCHAR".to_string(),
        },

        "CHAR" | "NCHAR" => match data_length.filter(|l| *l > 0) {
            Some(length) => format!("CHAR({})", length),
            None => "CHAR(1)".to_string(),
        },

        "DATE" => "TIMESTAMP".to_string(),

        "CLOB" | "NCLOB" | "LONG" => "TEXT".to_string(),
        "BLOB" | "RAW" | "LONG RAW" => "BYTEA".to_string(),

        "FLOAT" => "DOUBLE PRECISION".to_string(),
        "BINARY_FLOAT" => "REAL".to_string(),
        "BINARY_DOUBLE" => "DOUBLE PRECISION".to_string(),

        "ROWID" | "UROWID" => "TEXT".to_string(),

        other => {
            warn!("Unknown Oracle type: {}, mapping to TEXT", other);
            "TEXT".to_string()
        }
    }
}

/// Convert an Oracle default-value expression to a PostgreSQL
/// compatible one.
///
/// Returns `None` when the default cannot be converted automatically
/// (sequence-derived `.NEXTVAL` expressions need manual handling).
/// Unrecognized expressions pass through unchanged.
pub fn convert_default(default_value: &str, oracle_type: &str) -> Option<String> {
    let trimmed = default_value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_uppercase();

    if upper.starts_with("SYSDATE") || upper.starts_with("SYSTIMESTAMP") {
        return Some("CURRENT_TIMESTAMP".to_string());
    }
    if upper.starts_with("SYS_GUID()") {
        return Some("gen_random_uuid()".to_string());
    }
    if upper.starts_with("USER") {
        return Some("CURRENT_USER".to_string());
    }

    if upper.contains(".NEXTVAL") {
        warn!(
            "Sequence default value found: {}, may need manual conversion",
            trimmed
        );
        return None;
    }

    // For string defaults, make sure the literal is quoted exactly once.
    let oracle_type_upper = oracle_type.trim().to_uppercase();
    if matches!(
        oracle_type_upper.as_str(),
        "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "CLOB" | "NCLOB"
    ) && !trimmed.starts_with('\'')
    {
        return Some(format!("'{}'", trimmed));
    }

    Some(trimmed.to_string())
}
