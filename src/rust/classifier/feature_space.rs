use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Error as IoError, ErrorKind as IoErrorKind};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use super::bijection::Bijection;
use super::error::ClassifierError;

static NEXT_SPACE_ID: AtomicU64 = AtomicU64::new(1);

/// Separator between field and value in categorical feature keys.
pub const CATEGORICAL_SEPARATOR: &str = "||";

/// Process-unique tag identifying one `FeatureSpace` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(u64);

impl SpaceId {
    fn fresh() -> Self {
        SpaceId(NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What the frozen view does with a feature that was never seen in training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutOfVocabulary {
    /// Skip the feature; the sparse format has no way to represent it
    #[default]
    Drop,
    /// Fail with `ClassifierError::NotFound`
    Error,
}

/// Maps feature keys to stable positive integer IDs.
///
/// IDs start at 1 and are handed out in the order features are first observed.
/// An ID, once assigned, is never reused or reassigned.
#[derive(Debug)]
pub struct FeatureSpace {
    space_id: SpaceId,
    ids: HashMap<String, u32>,
    keys: Vec<String>,
    feature_names: Bijection<u32, String>,
    max_features: usize,
}

#[derive(Serialize, Deserialize)]
struct FeatureSpaceRecord {
    keys: Vec<String>,
    #[serde(default)]
    feature_names: Bijection<u32, String>,
}

impl Default for FeatureSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSpace {
    pub fn new() -> Self {
        Self::with_max_features(u32::MAX as usize)
    }

    /// Creates a feature space that refuses to grow past `max_features` entries.
    pub fn with_max_features(max_features: usize) -> Self {
        Self {
            space_id: SpaceId::fresh(),
            ids: HashMap::new(),
            keys: Vec::new(),
            feature_names: Bijection::new(),
            max_features: max_features.min(u32::MAX as usize),
        }
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    /// Returns the ID for `key`, assigning the next unused one if the key is new.
    pub fn id_for(&mut self, key: &str) -> Result<u32, ClassifierError> {
        if let Some(&id) = self.ids.get(key) {
            return Ok(id);
        }
        if self.keys.len() >= self.max_features {
            return Err(ClassifierError::FeatureSpaceExhausted(self.keys.len()));
        }
        let id = u32::try_from(self.keys.len() + 1)
            .map_err(|_| ClassifierError::FeatureSpaceExhausted(self.keys.len()))?;
        self.keys.push(key.to_owned());
        self.ids.insert(key.to_owned(), id);
        Ok(id)
    }

    /// Looks up a key without assigning anything.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key_for(&self, id: u32) -> Result<&str, ClassifierError> {
        self.get_key(id)
            .ok_or_else(|| ClassifierError::NotFound(format!("feature id {}", id)))
    }

    pub fn get_key(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.keys.get(id as usize - 1).map(String::as_str)
    }

    pub fn contains_id(&self, id: u32) -> bool {
        id != 0 && (id as usize) <= self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates `(id, key)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (i as u32 + 1, key.as_str()))
    }

    /// Builds a serialization-time filter from assigned IDs.
    pub fn selected_subset(
        &self,
        ids: impl IntoIterator<Item = u32>,
    ) -> Result<FeatureSubset, ClassifierError> {
        let mut selected = BTreeSet::new();
        for id in ids {
            if !self.contains_id(id) {
                return Err(ClassifierError::NotFound(format!("feature id {}", id)));
            }
            selected.insert(id);
        }
        Ok(FeatureSubset { ids: selected })
    }

    /// Builds a serialization-time filter from feature keys.
    pub fn subset_from_keys<S: AsRef<str>>(
        &self,
        keys: impl IntoIterator<Item = S>,
    ) -> Result<FeatureSubset, ClassifierError> {
        let mut selected = BTreeSet::new();
        for key in keys {
            let key = key.as_ref();
            let id = self
                .get(key)
                .ok_or_else(|| ClassifierError::NotFound(format!("feature '{}'", key)))?;
            selected.insert(id);
        }
        Ok(FeatureSubset { ids: selected })
    }

    /// Returns a read-only view that never assigns new IDs.
    pub fn frozen(&self, policy: OutOfVocabulary) -> FrozenFeatureSpace<'_> {
        FrozenFeatureSpace {
            space: self,
            policy,
            dropped: Vec::new(),
        }
    }

    /// Attaches a human-readable name to a feature code.
    pub fn name_feature(&mut self, id: u32, name: impl Into<String>) -> Result<(), ClassifierError> {
        self.feature_names.insert(id, name.into())
    }

    pub fn feature_name(&self, id: u32) -> Option<&str> {
        self.feature_names.get_code(&id).map(String::as_str)
    }

    pub fn feature_names(&self) -> &Bijection<u32, String> {
        &self.feature_names
    }

    /// Saves the feature table to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        let record = FeatureSpaceRecord {
            keys: self.keys.clone(),
            feature_names: self.feature_names.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &record).map_err(|e| IoError::new(IoErrorKind::Other, e))
    }

    /// Loads a feature table saved with [`FeatureSpace::save`].
    ///
    /// The loaded space keeps every ID but gets a fresh instance tag, so points
    /// encoded against the original are not interchangeable with it.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let reader = BufReader::new(File::open(path)?);
        let record: FeatureSpaceRecord = serde_json::from_reader(reader)
            .map_err(|e| IoError::new(IoErrorKind::InvalidData, e))?;

        let mut space = Self::new();
        for key in &record.keys {
            if space.ids.contains_key(key) {
                return Err(IoError::new(
                    IoErrorKind::InvalidData,
                    format!("duplicate feature key '{}'", key),
                ));
            }
            space
                .id_for(key)
                .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))?;
        }
        space.feature_names = record.feature_names;
        debug!("Loaded {} features from {:?}", space.len(), path);
        Ok(space)
    }
}

/// Resolves feature keys to IDs while a data point is being encoded.
pub trait FeatureIndex {
    fn space_id(&self) -> SpaceId;

    /// Returns the ID for `key`, or `None` if the feature should be left out.
    fn resolve(&mut self, key: &str) -> Result<Option<u32>, ClassifierError>;
}

impl FeatureIndex for FeatureSpace {
    fn space_id(&self) -> SpaceId {
        self.space_id
    }

    fn resolve(&mut self, key: &str) -> Result<Option<u32>, ClassifierError> {
        self.id_for(key).map(Some)
    }
}

/// Read-only handle used at classification time.
#[derive(Debug)]
pub struct FrozenFeatureSpace<'a> {
    space: &'a FeatureSpace,
    policy: OutOfVocabulary,
    dropped: Vec<String>,
}

impl FrozenFeatureSpace<'_> {
    /// Keys left out because they were never seen in training.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }
}

impl FeatureIndex for FrozenFeatureSpace<'_> {
    fn space_id(&self) -> SpaceId {
        self.space.space_id
    }

    fn resolve(&mut self, key: &str) -> Result<Option<u32>, ClassifierError> {
        match (self.space.get(key), self.policy) {
            (Some(id), _) => Ok(Some(id)),
            (None, OutOfVocabulary::Drop) => {
                self.dropped.push(key.to_owned());
                Ok(None)
            }
            (None, OutOfVocabulary::Error) => Err(ClassifierError::NotFound(format!(
                "feature '{}' was not seen during training",
                key
            ))),
        }
    }
}

/// A set of feature IDs that restricts what gets serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSubset {
    ids: BTreeSet<u32>,
}

impl FeatureSubset {
    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_assigned_in_first_seen_order() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        assert_eq!(space.id_for("word||cat")?, 1);
        assert_eq!(space.id_for("word||dog")?, 2);
        assert_eq!(space.id_for("aardvark")?, 3);
        assert_eq!(space.len(), 3);
        Ok(())
    }

    #[test]
    fn test_id_stability_interleaved() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let first = space.id_for("a")?;
        for i in 0..100 {
            space.id_for(&format!("f{}", i))?;
            assert_eq!(space.id_for("a")?, first);
        }
        assert_eq!(space.len(), 101);
        Ok(())
    }

    #[test]
    fn test_reverse_lookup() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let id = space.id_for("color||red")?;
        assert_eq!(space.key_for(id)?, "color||red");
        assert!(matches!(space.key_for(0), Err(ClassifierError::NotFound(_))));
        assert!(matches!(space.key_for(2), Err(ClassifierError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut space = FeatureSpace::with_max_features(2);
        space.id_for("a").unwrap();
        space.id_for("b").unwrap();
        assert_eq!(space.id_for("a").unwrap(), 1);
        assert!(matches!(
            space.id_for("c"),
            Err(ClassifierError::FeatureSpaceExhausted(2))
        ));
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn test_frozen_view_never_mints() {
        let mut space = FeatureSpace::new();
        space.id_for("known").unwrap();

        let mut frozen = space.frozen(OutOfVocabulary::Drop);
        assert_eq!(frozen.resolve("known").unwrap(), Some(1));
        assert_eq!(frozen.resolve("unseen").unwrap(), None);
        assert_eq!(frozen.dropped(), &["unseen".to_string()]);

        let mut strict = space.frozen(OutOfVocabulary::Error);
        assert!(matches!(strict.resolve("unseen"), Err(ClassifierError::NotFound(_))));

        assert_eq!(space.len(), 1);
        assert!(space.get("unseen").is_none());
    }

    #[test]
    fn test_selected_subset_requires_assigned_ids() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        space.id_for("a")?;
        space.id_for("b")?;

        let subset = space.selected_subset([2, 1, 2])?;
        assert_eq!(subset.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert!(space.selected_subset([3]).is_err());

        let by_key = space.subset_from_keys(["b"])?;
        assert!(by_key.contains(2) && !by_key.contains(1));
        assert!(space.subset_from_keys(["zzz"]).is_err());
        Ok(())
    }

    #[test]
    fn test_feature_names() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let id = space.id_for("w||1")?;
        space.name_feature(id, "first word")?;
        assert_eq!(space.feature_name(id), Some("first word"));
        assert_eq!(space.feature_name(id + 1), None);
        assert!(space.name_feature(id, "renamed").is_err());
        assert_eq!(space.feature_name(id), Some("first word"));
        Ok(())
    }

    #[test]
    fn test_save_and_load_preserves_ids() -> Result<(), Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir().join(format!("vecspace-fs-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("features.json");

        let mut space = FeatureSpace::new();
        space.id_for("alpha")?;
        space.id_for("beta")?;
        space.name_feature(2, "second")?;
        space.save(&path)?;

        let mut loaded = FeatureSpace::load(&path)?;
        assert_eq!(loaded.get("alpha"), Some(1));
        assert_eq!(loaded.get("beta"), Some(2));
        assert_eq!(loaded.feature_name(2), Some("second"));
        assert_ne!(loaded.space_id(), space.space_id());
        assert_eq!(loaded.id_for("gamma")?, 3);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
