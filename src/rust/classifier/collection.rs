use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};

use super::data_point::DataPoint;
use super::error::ClassifierError;
use super::feature_space::{FeatureSpace, FeatureSubset, SpaceId};

/// Label written for entries that carry none. Backends ignore it when predicting.
pub const UNLABELED_CODE: i32 = 0;

/// A data point together with its optional label code.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPoint {
    pub point: DataPoint,
    pub label: Option<i32>,
}

/// An ordered set of data points that all share one feature space, and its
/// sparse text form:
///
/// ```text
/// <label> <id>:<value> <id>:<value> ...
/// ```
///
/// # Example
/// ```
/// use vecspace::{DataPointEncoder, Datum, FeatureSpace, VectorCollection};
///
/// let mut space = FeatureSpace::new();
/// let encoder = DataPointEncoder::default();
/// let mut training = VectorCollection::new(&space);
///
/// let cat = encoder.encode(&Datum::features([("word||cat", 1.0)]), &mut space)?;
/// let dog = encoder.encode(&Datum::features([("word||dog", 1.0)]), &mut space)?;
/// training.add(cat, Some(1))?;
/// training.add(dog, Some(-1))?;
///
/// assert_eq!(training.serialize(None), "1 1:1\n-1 2:1\n");
/// # Ok::<(), vecspace::ClassifierError>(())
/// ```
#[derive(Debug, Clone)]
pub struct VectorCollection {
    space_id: SpaceId,
    entries: Vec<LabeledPoint>,
}

impl VectorCollection {
    pub fn new(space: &FeatureSpace) -> Self {
        Self {
            space_id: space.space_id(),
            entries: Vec::new(),
        }
    }

    /// Appends a point. `None` marks an unlabeled (query) entry.
    ///
    /// # Errors
    /// - `FeatureSpaceMismatch` if the point was encoded against another feature space
    pub fn add(&mut self, point: DataPoint, label: Option<i32>) -> Result<(), ClassifierError> {
        if point.space_id() != self.space_id {
            return Err(ClassifierError::FeatureSpaceMismatch);
        }
        self.entries.push(LabeledPoint { point, label });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LabeledPoint] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledPoint> {
        self.entries.iter()
    }

    /// Renders every entry, in insertion order, one line each.
    pub fn serialize(&self, subset: Option<&FeatureSubset>) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            format_line(&mut out, entry, subset);
        }
        out
    }

    /// Streams the sparse text form into `writer`.
    pub fn write_to<W: Write>(&self, writer: W, subset: Option<&FeatureSubset>) -> io::Result<()> {
        let mut writer = BufWriter::new(writer);
        let mut line = String::new();
        for entry in &self.entries {
            line.clear();
            format_line(&mut line, entry, subset);
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()
    }

    /// Parses sparse text back into a collection bound to `space`.
    ///
    /// Blank lines and `#` comments are ignored. Every entry comes back
    /// labeled; unlabeled entries read back as `Some(UNLABELED_CODE)`.
    ///
    /// # Errors
    /// - `Parse` for a malformed label or pair, a zero id, or ids that are not strictly ascending
    /// - `NotFound` for an id that `space` never assigned
    pub fn deserialize(text: &str, space: &FeatureSpace) -> Result<Self, ClassifierError> {
        let mut collection = Self::new(space);
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let mut tokens = content.split_whitespace();
            let label_token = tokens.next().unwrap_or("");
            let label: i32 = label_token.parse().map_err(|_| ClassifierError::Parse {
                line: line_no,
                message: format!("invalid label '{}'", label_token),
            })?;

            let mut pairs = Vec::new();
            let mut previous = 0u32;
            for token in tokens {
                let (id, value) = parse_pair(token, line_no)?;
                if id <= previous {
                    return Err(ClassifierError::Parse {
                        line: line_no,
                        message: format!("feature id {} is not strictly ascending", id),
                    });
                }
                if !space.contains_id(id) {
                    return Err(ClassifierError::NotFound(format!("feature id {} on line {}", id, line_no)));
                }
                previous = id;
                pairs.push((id, value));
            }
            collection.entries.push(LabeledPoint {
                point: DataPoint::from_unsorted(space.space_id(), pairs),
                label: Some(label),
            });
        }
        Ok(collection)
    }
}

fn format_line(out: &mut String, entry: &LabeledPoint, subset: Option<&FeatureSubset>) {
    // Writing into a String cannot fail
    let _ = write!(out, "{}", entry.label.unwrap_or(UNLABELED_CODE));
    for (id, value) in entry.point.to_sparse_pairs(subset) {
        let _ = write!(out, " {}:{}", id, value);
    }
    out.push('\n');
}

fn parse_pair(token: &str, line: usize) -> Result<(u32, f64), ClassifierError> {
    let malformed = |message: String| ClassifierError::Parse { line, message };

    let (id, value) = token
        .split_once(':')
        .ok_or_else(|| malformed(format!("expected <id>:<value>, found '{}'", token)))?;
    let id: u32 = id
        .parse()
        .map_err(|_| malformed(format!("invalid feature id '{}'", id)))?;
    if id == 0 {
        return Err(malformed("feature ids start at 1".to_string()));
    }
    let value: f64 = value
        .parse()
        .map_err(|_| malformed(format!("invalid value '{}'", value)))?;
    if !value.is_finite() {
        return Err(malformed(format!("non-finite value for feature {}", id)));
    }
    Ok((id, value))
}
