use driftdb_protocol::Value;

/// Entrada no keyspace: valor + instante de expiração opcional.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: Value,
    /// Milissegundos Unix absolutos. `None` nunca expira.
    pub expires_at: Option<i64>,
    /// Carimbo da escrita que criou a entrada. Timers de expiração só removem
    /// a entrada se o carimbo ainda for o mesmo.
    pub generation: u64,
}

impl StoredEntry {
    pub fn new(value: Value, expires_at: Option<i64>, generation: u64) -> Self {
        Self {
            value,
            expires_at,
            generation,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_boundary_is_inclusive() {
        let entry = StoredEntry::new(Value::string("v"), Some(1_000), 1);
        assert!(!entry.is_expired(999));
        assert!(entry.is_expired(1_000));
        assert!(entry.is_expired(1_001));
    }

    #[test]
    fn entry_without_expiration_never_expires() {
        let entry = StoredEntry::new(Value::string("v"), None, 1);
        assert!(!entry.is_expired(i64::MAX));
    }
}
