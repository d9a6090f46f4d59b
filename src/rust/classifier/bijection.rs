use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// An append-only one-to-one mapping between keys and codes.
///
/// Both directions are unique: no two keys share a code and no two codes
/// share a key. Entries are never removed.
///
/// # Example
/// ```
/// use vecspace::Bijection;
///
/// let mut labels = Bijection::new();
/// labels.insert("positive".to_string(), 1)?;
/// labels.insert("negative".to_string(), -1)?;
///
/// assert_eq!(labels.code_of(&"positive".to_string())?, 1);
/// assert_eq!(labels.key_of(&-1)?, "negative");
/// # Ok::<(), vecspace::ClassifierError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, C: Serialize",
    deserialize = "K: Deserialize<'de> + Eq + Hash, C: Deserialize<'de> + Eq + Hash"
))]
pub struct Bijection<K, C>
where
    K: Eq + Hash,
    C: Eq + Hash,
{
    by_key: HashMap<K, C>,
    by_code: HashMap<C, K>,
}

impl<K, C> Default for Bijection<K, C>
where
    K: Eq + Hash,
    C: Eq + Hash,
{
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            by_code: HashMap::new(),
        }
    }
}

impl<K, C> Bijection<K, C>
where
    K: Eq + Hash + Clone + Display,
    C: Eq + Hash + Clone + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key ↔ code`.
    ///
    /// Re-inserting an identical pair is a no-op. A conflicting insert fails
    /// and leaves the mapping untouched.
    pub fn insert(&mut self, key: K, code: C) -> Result<(), ClassifierError> {
        if let Some(existing) = self.by_key.get(&key) {
            if *existing == code {
                return Ok(());
            }
            return Err(ClassifierError::DuplicateKey {
                key: key.to_string(),
                existing: existing.to_string(),
            });
        }
        if let Some(existing) = self.by_code.get(&code) {
            return Err(ClassifierError::DuplicateCode {
                code: code.to_string(),
                existing: existing.to_string(),
            });
        }
        self.by_key.insert(key.clone(), code.clone());
        self.by_code.insert(code, key);
        Ok(())
    }

    pub fn code_of(&self, key: &K) -> Result<C, ClassifierError> {
        self.get_code(key)
            .cloned()
            .ok_or_else(|| ClassifierError::NotFound(format!("no code for key '{}'", key)))
    }

    pub fn key_of(&self, code: &C) -> Result<K, ClassifierError> {
        self.get_key(code)
            .cloned()
            .ok_or_else(|| ClassifierError::NotFound(format!("no key for code {}", code)))
    }

    pub fn get_code(&self, key: &K) -> Option<&C> {
        self.by_key.get(key)
    }

    pub fn get_key(&self, code: &C) -> Option<&K> {
        self.by_code.get(code)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &C)> {
        self.by_key.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup_both_directions() -> Result<(), ClassifierError> {
        let mut bijection = Bijection::new();
        bijection.insert("a".to_string(), 1u32)?;
        bijection.insert("b".to_string(), 2u32)?;

        assert_eq!(bijection.code_of(&"a".to_string())?, 1);
        assert_eq!(bijection.key_of(&2)?, "b");
        assert_eq!(bijection.len(), 2);
        Ok(())
    }

    #[test]
    fn test_reinserting_same_pair_is_noop() -> Result<(), ClassifierError> {
        let mut bijection = Bijection::new();
        bijection.insert("a".to_string(), 1u32)?;
        bijection.insert("a".to_string(), 1u32)?;
        assert_eq!(bijection.len(), 1);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut bijection = Bijection::new();
        bijection.insert("a".to_string(), 1u32).unwrap();
        let err = bijection.insert("a".to_string(), 2).unwrap_err();
        assert!(matches!(err, ClassifierError::DuplicateKey { .. }));
        assert!(bijection.get_code(&"a".to_string()) == Some(&1));
        assert!(bijection.get_key(&2).is_none());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let mut bijection = Bijection::new();
        bijection.insert("a".to_string(), 1u32).unwrap();
        let err = bijection.insert("b".to_string(), 1).unwrap_err();
        assert!(matches!(err, ClassifierError::DuplicateCode { .. }));
        assert!(bijection.get_code(&"b".to_string()).is_none());
        assert_eq!(bijection.len(), 1);
    }

    #[test]
    fn test_missing_lookups_are_not_found() {
        let bijection: Bijection<String, i32> = Bijection::new();
        assert!(matches!(
            bijection.code_of(&"x".to_string()),
            Err(ClassifierError::NotFound(_))
        ));
        assert!(matches!(bijection.key_of(&7), Err(ClassifierError::NotFound(_))));
    }

    #[test]
    fn test_uniqueness_holds_across_many_inserts() {
        let mut bijection = Bijection::new();
        for i in 0..50i32 {
            bijection.insert(format!("k{}", i), i * 3).unwrap();
        }
        // Conflicting inserts in both directions
        for i in 0..50i32 {
            assert!(bijection.insert(format!("k{}", i), -1 - i).is_err());
            assert!(bijection.insert(format!("other{}", i), i * 3).is_err());
        }
        for (key, code) in bijection.iter() {
            assert_eq!(bijection.get_key(code), Some(key));
        }
        assert_eq!(bijection.len(), 50);
    }
}
