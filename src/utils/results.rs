// The results accumulator shared by every stage of a run.
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::defs::PipelineError;
use crate::utils::aodp::HitRecord;
use crate::utils::dedup::SequenceCounts;
use crate::utils::flash::HistogramBin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultKey {
    JoinHistogram,
    JoinedPairCount,
    RemainderPairCount,
    SequenceCounts,
    Hits,
}

impl ResultKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKey::JoinHistogram => "join_histogram",
            ResultKey::JoinedPairCount => "joined_pair_count",
            ResultKey::RemainderPairCount => "remainder_pair_count",
            ResultKey::SequenceCounts => "sequence_counts",
            ResultKey::Hits => "hits",
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Histogram(Vec<HistogramBin>),
    Count(u64),
    SequenceCounts(SequenceCounts),
    Hits(Vec<HitRecord>),
}

impl ResultValue {
    fn fits(&self, key: ResultKey) -> bool {
        matches!(
            (key, self),
            (ResultKey::JoinHistogram, ResultValue::Histogram(_))
                | (ResultKey::JoinedPairCount, ResultValue::Count(_))
                | (ResultKey::RemainderPairCount, ResultValue::Count(_))
                | (ResultKey::SequenceCounts, ResultValue::SequenceCounts(_))
                | (ResultKey::Hits, ResultValue::Hits(_))
        )
    }
}

impl Serialize for ResultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultValue::Histogram(bins) => bins.serialize(serializer),
            ResultValue::Count(n) => n.serialize(serializer),
            ResultValue::SequenceCounts(counts) => {
                // Sorted so the uploaded document is stable between runs.
                let sorted: BTreeMap<&String, &u64> = counts.iter().collect();
                sorted.serialize(serializer)
            }
            ResultValue::Hits(hits) => hits.serialize(serializer),
        }
    }
}


/// Stage outputs keyed by [`ResultKey`]. Keys are only ever added, never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsAccumulator {
    values: BTreeMap<ResultKey, ResultValue>,
}

impl ResultsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ResultKey, value: ResultValue) -> Result<(), PipelineError> {
        if !value.fits(key) {
            return Err(PipelineError::InvalidConfig(format!(
                "value stored under '{}' has the wrong shape",
                key
            )));
        }
        if self.values.contains_key(&key) {
            return Err(PipelineError::DuplicateResult(key.to_string()));
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn contains(&self, key: ResultKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn get(&self, key: ResultKey) -> Option<&ResultValue> {
        self.values.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ResultKey> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn join_histogram(&self) -> Option<&[HistogramBin]> {
        match self.values.get(&ResultKey::JoinHistogram) {
            Some(ResultValue::Histogram(bins)) => Some(bins),
            _ => None,
        }
    }

    pub fn count(&self, key: ResultKey) -> Option<u64> {
        match self.values.get(&key) {
            Some(ResultValue::Count(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn sequence_counts(&self) -> Option<&SequenceCounts> {
        match self.values.get(&ResultKey::SequenceCounts) {
            Some(ResultValue::SequenceCounts(counts)) => Some(counts),
            _ => None,
        }
    }

    pub fn hits(&self) -> Option<&[HitRecord]> {
        match self.values.get(&ResultKey::Hits) {
            Some(ResultValue::Hits(hits)) => Some(hits),
            _ => None,
        }
    }
}

impl Serialize for ResultsAccumulator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}
