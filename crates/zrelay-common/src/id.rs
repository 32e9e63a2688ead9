use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialize the process-wide snowflake generator with explicit
/// machine/node identifiers (each 0-31). Safe to call more than once;
/// the last call wins.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate the next snowflake id, rendered as a decimal string.
///
/// Falls back to a (1, 1) generator when [`init`] was never called.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        init(1, 1);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(next_id()));
        }
    }

    #[test]
    fn ids_are_numeric_strings() {
        init(1, 1);
        assert!(next_id().parse::<i64>().is_ok());
    }
}
