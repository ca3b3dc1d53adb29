use std::sync::RwLock;

/// Supplies the bearer token at call time.
pub trait CredentialSource: Send + Sync {
    /// Current key, or `None` when none is configured.
    fn current_key(&self) -> Option<String>;
}

/// A key fixed at construction, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct StaticKey(String);

impl StaticKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl CredentialSource for StaticKey {
    fn current_key(&self) -> Option<String> {
        non_empty(&self.0)
    }
}

/// A key that a settings collaborator may replace while clients hold it.
#[derive(Debug, Default)]
pub struct SharedKey(RwLock<String>);

impl SharedKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(RwLock::new(key.into()))
    }

    pub fn set(&self, key: impl Into<String>) {
        if let Ok(mut guard) = self.0.write() {
            *guard = key.into();
        }
    }
}

impl CredentialSource for SharedKey {
    fn current_key(&self) -> Option<String> {
        // A poisoned lock reads as "no key".
        self.0.read().ok().and_then(|k| non_empty(&k))
    }
}

fn non_empty(key: &str) -> Option<String> {
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_read_as_missing() {
        assert_eq!(StaticKey::new("").current_key(), None);
        assert_eq!(StaticKey::new("   ").current_key(), None);
        assert_eq!(StaticKey::new(" sk-1 ").current_key().as_deref(), Some("sk-1"));
    }

    #[test]
    fn shared_key_can_be_replaced() {
        let key = SharedKey::default();
        assert_eq!(key.current_key(), None);
        key.set("sk-new");
        assert_eq!(key.current_key().as_deref(), Some("sk-new"));
        key.set("");
        assert_eq!(key.current_key(), None);
    }
}
