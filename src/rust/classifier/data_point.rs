use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::analyzer::{Analyzer, WhitespaceAnalyzer};
use super::error::ClassifierError;
use super::feature_space::{FeatureIndex, FeatureSubset, SpaceId, CATEGORICAL_SEPARATOR};

/// One raw input, before it is encoded against a feature space.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Feature key → value. Keys may already be categorical `field||value` pairs.
    Features(Vec<(String, f64)>),
    /// Free text, tokenized by the configured analyzer
    Text(String),
}

impl Datum {
    pub fn features<K: Into<String>>(features: impl IntoIterator<Item = (K, f64)>) -> Self {
        Datum::Features(features.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Datum::Text(text.into())
    }

    /// A single categorical feature `field||value` with value 1.
    ///
    /// ```
    /// use vecspace::Datum;
    ///
    /// assert_eq!(
    ///     Datum::categorical("word", "cat"),
    ///     Datum::features([("word||cat", 1.0)])
    /// );
    /// ```
    pub fn categorical(field: &str, value: &str) -> Self {
        Datum::Features(vec![(categorical_key(field, value), 1.0)])
    }
}

/// Builds the composite key used for categorical features.
pub fn categorical_key(field: &str, value: &str) -> String {
    format!("{}{}{}", field, CATEGORICAL_SEPARATOR, value)
}

impl From<&str> for Datum {
    fn from(text: &str) -> Self {
        Datum::Text(text.to_owned())
    }
}

impl From<String> for Datum {
    fn from(text: String) -> Self {
        Datum::Text(text)
    }
}

impl From<Vec<(String, f64)>> for Datum {
    fn from(features: Vec<(String, f64)>) -> Self {
        Datum::Features(features)
    }
}

impl From<BTreeMap<String, f64>> for Datum {
    fn from(features: BTreeMap<String, f64>) -> Self {
        Datum::Features(features.into_iter().collect())
    }
}

/// Keys are taken in sorted order so that ID assignment does not depend on
/// hash iteration order.
impl From<HashMap<String, f64>> for Datum {
    fn from(features: HashMap<String, f64>) -> Self {
        let mut features: Vec<_> = features.into_iter().collect();
        features.sort_by(|a, b| a.0.cmp(&b.0));
        Datum::Features(features)
    }
}

/// How a term's occurrences in a text become a feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TermWeighting {
    /// Number of occurrences
    #[default]
    TermFrequency,
    /// 1 if the term occurs at all
    Presence,
}

/// A sparse vector: `(feature id, value)` pairs, strictly ascending by id,
/// with no zero values.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    space_id: SpaceId,
    pairs: Vec<(u32, f64)>,
}

impl DataPoint {
    /// Builds a point from pairs in any order. Repeated ids are summed and
    /// entries that end up zero are dropped.
    pub(crate) fn from_unsorted(space_id: SpaceId, pairs: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut merged: BTreeMap<u32, f64> = BTreeMap::new();
        for (id, value) in pairs {
            *merged.entry(id).or_insert(0.0) += value;
        }
        Self {
            space_id,
            pairs: merged.into_iter().filter(|&(_, value)| value != 0.0).collect(),
        }
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    pub fn pairs(&self) -> &[(u32, f64)] {
        &self.pairs
    }

    /// Returns the pairs, optionally restricted to the ids in `subset`.
    pub fn to_sparse_pairs(&self, subset: Option<&FeatureSubset>) -> Vec<(u32, f64)> {
        match subset {
            Some(subset) => self
                .pairs
                .iter()
                .copied()
                .filter(|(id, _)| subset.contains(*id))
                .collect(),
            None => self.pairs.clone(),
        }
    }

    /// Value at `id`, 0 if absent.
    pub fn get(&self, id: u32) -> f64 {
        match self.pairs.binary_search_by_key(&id, |&(i, _)| i) {
            Ok(pos) => self.pairs[pos].1,
            Err(_) => 0.0,
        }
    }

    /// Number of non-zero entries
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Encodes each `Datum` variant into a `DataPoint`.
#[derive(Debug, Clone)]
pub struct DataPointEncoder {
    analyzer: Arc<dyn Analyzer>,
    weighting: TermWeighting,
}

impl Default for DataPointEncoder {
    fn default() -> Self {
        Self::new(Arc::new(WhitespaceAnalyzer), TermWeighting::default())
    }
}

impl DataPointEncoder {
    pub fn new(analyzer: Arc<dyn Analyzer>, weighting: TermWeighting) -> Self {
        Self { analyzer, weighting }
    }

    pub fn weighting(&self) -> TermWeighting {
        self.weighting
    }

    /// Encodes `datum`, resolving every feature through `index`.
    ///
    /// Validation and analysis happen before any feature is resolved, so a
    /// failed encode never grows the feature space.
    pub fn encode<I>(&self, datum: &Datum, index: &mut I) -> Result<DataPoint, ClassifierError>
    where
        I: FeatureIndex + ?Sized,
    {
        match datum {
            Datum::Features(features) => self.encode_features(features, index),
            Datum::Text(text) => self.encode_text(text, index),
        }
    }

    fn encode_features<I>(&self, features: &[(String, f64)], index: &mut I) -> Result<DataPoint, ClassifierError>
    where
        I: FeatureIndex + ?Sized,
    {
        if let Some((key, value)) = features.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ClassifierError::InvalidFeatureValue {
                key: key.clone(),
                value: *value,
            });
        }

        let mut pairs = Vec::with_capacity(features.len());
        for (key, value) in features.iter().filter(|(_, value)| *value != 0.0) {
            if let Some(id) = index.resolve(key)? {
                pairs.push((id, *value));
            }
        }
        Ok(DataPoint::from_unsorted(index.space_id(), pairs))
    }

    fn encode_text<I>(&self, text: &str, index: &mut I) -> Result<DataPoint, ClassifierError>
    where
        I: FeatureIndex + ?Sized,
    {
        let terms = self.analyzer.analyze(text)?;

        // Distinct terms in first-seen order, so new ids follow the text
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, f64)> = Vec::new();
        for term in &terms {
            match positions.get(term.as_str()) {
                Some(&pos) => counts[pos].1 += 1.0,
                None => {
                    positions.insert(term.as_str(), counts.len());
                    counts.push((term.as_str(), 1.0));
                }
            }
        }

        let mut pairs = Vec::with_capacity(counts.len());
        for (term, count) in counts {
            let value = match self.weighting {
                TermWeighting::TermFrequency => count,
                TermWeighting::Presence => 1.0,
            };
            if let Some(id) = index.resolve(term)? {
                pairs.push((id, value));
            }
        }
        Ok(DataPoint::from_unsorted(index.space_id(), pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::feature_space::{FeatureSpace, OutOfVocabulary};

    #[test]
    fn test_feature_map_encoding_is_sorted_and_sparse() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        space.id_for("z")?;
        space.id_for("y")?;

        let encoder = DataPointEncoder::default();
        let datum = Datum::features([("y", 2.0), ("x", 0.0), ("z", 0.5), ("w", -1.0)]);
        let point = encoder.encode(&datum, &mut space)?;

        // Zero-valued entries never reach the feature space
        assert_eq!(space.get("x"), None);
        assert_eq!(space.get("w"), Some(3));
        assert_eq!(point.pairs(), &[(1, 0.5), (2, 2.0), (3, -1.0)]);
        assert!(point.pairs().iter().all(|&(_, v)| v != 0.0));
        assert_eq!(point.get(3), -1.0);
        assert_eq!(point.get(4), 0.0);
        Ok(())
    }

    #[test]
    fn test_zero_values_skip_strict_lookup() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        encoder.encode(&Datum::features([("seen", 1.0)]), &mut space)?;

        let mut frozen = space.frozen(OutOfVocabulary::Error);
        let point = encoder.encode(&Datum::features([("seen", 2.0), ("unseen", 0.0)]), &mut frozen)?;
        assert_eq!(point.pairs(), &[(1, 2.0)]);

        let unseen = encoder.encode(&Datum::features([("unseen", 1.0)]), &mut frozen);
        assert!(matches!(unseen, Err(ClassifierError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_repeated_keys_sum() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        let point = encoder.encode(&Datum::features([("a", 1.0), ("b", 1.0), ("a", 2.0), ("b", -1.0)]), &mut space)?;
        assert_eq!(point.pairs(), &[(1, 3.0)]);
        Ok(())
    }

    #[test]
    fn test_non_finite_value_rejected_without_growth() {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        let datum = Datum::features([("ok", 1.0), ("bad", f64::NAN)]);
        let result = encoder.encode(&datum, &mut space);
        assert!(matches!(result, Err(ClassifierError::InvalidFeatureValue { .. })));
        assert!(space.is_empty());
    }

    #[test]
    fn test_text_term_frequency() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        let point = encoder.encode(&Datum::text("the cat saw the other cat"), &mut space)?;

        assert_eq!(space.get("the"), Some(1));
        assert_eq!(space.get("cat"), Some(2));
        assert_eq!(point.pairs(), &[(1, 2.0), (2, 2.0), (3, 1.0), (4, 1.0)]);
        Ok(())
    }

    #[test]
    fn test_text_presence_weighting() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::new(Arc::new(WhitespaceAnalyzer), TermWeighting::Presence);
        let point = encoder.encode(&Datum::text("go go go stop"), &mut space)?;
        assert_eq!(point.pairs(), &[(1, 1.0), (2, 1.0)]);
        Ok(())
    }

    #[test]
    fn test_frozen_encoding_drops_unseen() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        encoder.encode(&Datum::text("known words"), &mut space)?;

        let mut frozen = space.frozen(OutOfVocabulary::Drop);
        let point = encoder.encode(&Datum::text("known unknown words"), &mut frozen)?;
        assert_eq!(point.pairs(), &[(1, 1.0), (2, 1.0)]);
        assert_eq!(frozen.dropped(), &["unknown".to_string()]);
        assert_eq!(space.len(), 2);
        Ok(())
    }

    #[test]
    fn test_subset_filtering_preserves_order() -> Result<(), ClassifierError> {
        let mut space = FeatureSpace::new();
        let encoder = DataPointEncoder::default();
        let point = encoder.encode(&Datum::features([("a", 1.0), ("b", 2.0), ("c", 3.0)]), &mut space)?;

        let subset = space.selected_subset([3, 1])?;
        assert_eq!(point.to_sparse_pairs(Some(&subset)), vec![(1, 1.0), (3, 3.0)]);
        assert_eq!(point.to_sparse_pairs(None), point.pairs().to_vec());
        Ok(())
    }

    #[test]
    fn test_hash_map_input_is_deterministic() -> Result<(), ClassifierError> {
        let mut map = HashMap::new();
        map.insert("b".to_string(), 1.0);
        map.insert("a".to_string(), 1.0);
        map.insert("c".to_string(), 1.0);

        let mut space = FeatureSpace::new();
        DataPointEncoder::default().encode(&Datum::from(map), &mut space)?;
        assert_eq!(space.get("a"), Some(1));
        assert_eq!(space.get("c"), Some(3));
        Ok(())
    }
}
