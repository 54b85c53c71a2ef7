//! Mergeable summary statistics.
//!
//! A [`Statistic`] summarizes a batch of samples by count, mean and the sum
//! of squared deviations from the mean (`m2`). Two statistics computed on
//! disjoint batches merge exactly with Chan's parallel rule, so shards can be
//! combined in any order without access to the raw samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub count: u64,
    #[serde(with = "float_repr")]
    pub mean: f64,
    #[serde(with = "float_repr")]
    pub m2: f64,
}

/// JSON has no NaN or infinity: those are written as the strings `"NaN"`,
/// `"inf"` and `"-inf"`, finite values as plain numbers.
mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if x.is_finite() {
            serializer.serialize_f64(*x)
        } else if x.is_nan() {
            serializer.serialize_str("NaN")
        } else if x.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(x) => Ok(x),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float `{other}`"))),
            },
        }
    }
}

impl Statistic {
    /// Statistic of zero samples; the identity of [`Statistic::merge`].
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Welford accumulation over `samples`.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut stat = Self::empty();
        for &x in samples {
            stat.push(x);
        }
        stat
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Combine with a statistic computed over a disjoint batch.
    #[must_use]
    pub fn merge(&self, other: &Statistic) -> Statistic {
        if other.count == 0 {
            return *self;
        }
        if self.count == 0 {
            return *other;
        }
        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let n = n1 + n2;
        let delta = self.mean - other.mean;
        Statistic {
            count: self.count + other.count,
            mean: (n1 * self.mean + n2 * other.mean) / n,
            m2: self.m2 + other.m2 + delta * delta * n1 * n2 / n,
        }
    }

    pub fn merge_in(&mut self, other: &Statistic) {
        *self = self.merge(other);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Population variance `m2 / n`, NaN when empty
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.m2 / self.count as f64
    }

    /// Unbiased variance `m2 / (n - 1)`, NaN below two samples
    #[must_use]
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        self.m2 / (self.count - 1) as f64
    }

    #[must_use]
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean
    #[must_use]
    pub fn stderr(&self) -> f64 {
        self.std() / (self.count as f64).sqrt()
    }

    /// Named summary values: `count`, `mean`, `std`, `stderr`
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("count", self.count as f64),
            ("mean", self.mean),
            ("std", self.std()),
            ("stderr", self.stderr()),
        ])
    }
}

impl FromIterator<f64> for Statistic {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stat = Self::empty();
        for x in iter {
            stat.push(x);
        }
        stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples() {
        let s = Statistic::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.count, 8);
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.variance() - 4.0).abs() < 1e-12);
        assert!((s.std() - 2.0).abs() < 1e-12);
        assert!((s.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_merge_identity() {
        let s = Statistic::from_samples(&[1.0, 2.0]);
        assert_eq!(s.merge(&Statistic::empty()), s);
        assert_eq!(Statistic::empty().merge(&s), s);
        assert!(Statistic::empty().variance().is_nan());
    }

    #[test]
    fn test_single_sample_has_zero_variance() {
        let s = Statistic::from_samples(&[3.5]);
        assert_eq!(s.variance(), 0.0);
        assert!(s.sample_variance().is_nan());
    }

    #[test]
    fn test_non_finite_values_survive_json() {
        let stats = vec![
            Statistic::from_samples(&[1.0, f64::NAN]),
            Statistic::from_samples(&[f64::INFINITY]),
            Statistic::from_samples(&[f64::NEG_INFINITY]),
            Statistic::from_samples(&[0.5, 1.5]),
        ];
        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("null"));
        let back: Vec<Statistic> = serde_json::from_str(&json).unwrap();

        assert_eq!(back[0].count, 2);
        assert!(back[0].mean.is_nan() && back[0].m2.is_nan());
        assert_eq!(back[1].mean, f64::INFINITY);
        assert_eq!(back[2].mean, f64::NEG_INFINITY);
        assert_eq!(back[3], stats[3]);
    }

    #[test]
    fn test_unknown_float_text_is_rejected() {
        let bad = r#"{"count": 1, "mean": "lots", "m2": 0.0}"#;
        assert!(serde_json::from_str::<Statistic>(bad).is_err());
    }

    #[test]
    fn test_to_map_keys() {
        let s: Statistic = [1.0, 3.0].into_iter().collect();
        let map = s.to_map();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec!["count", "mean", "std", "stderr"]);
        assert_eq!(map["mean"], 2.0);
        assert_eq!(map["std"], 1.0);
    }
}
