// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter discovery by field frequency over a sample of elements.
//!
//! Sampling is random; use [`discover_parameters_with_rng`] with a seeded
//! generator, or a `sample_size` at least as large as the input, for
//! reproducible results. Batches yield to the runtime in between so large
//! inputs do not starve other tasks.

use std::borrow::Borrow;

use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::inference::PARAMETERS_GROUP;
use crate::parameter::{ParameterDefinition, CUSTOM_PARAMETERS};
use crate::value::ParameterType;

/// Discovery tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryOptions {
    /// Maximum number of elements inspected.
    pub sample_size: usize,
    /// Minimum share of sampled elements a field must appear on (0.0–1.0).
    pub min_frequency: f64,
    /// Fields never reported.
    pub exclude_params: FxHashSet<String>,
    /// Elements processed between yields.
    pub batch_size: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            sample_size: 100,
            min_frequency: 0.1,
            exclude_params: FxHashSet::default(),
            batch_size: 20,
        }
    }
}

impl DiscoveryOptions {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(Error::InvalidOptions("sample_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_frequency) {
            return Err(Error::InvalidOptions(format!(
                "min_frequency must be within 0..=1, got {}",
                self.min_frequency
            )));
        }
        Ok(())
    }

    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_params.extend(fields.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug)]
struct FieldStats {
    count: usize,
    param_type: ParameterType,
    group: String,
    first_seen: usize,
}

/// Discovers parameters with a thread-local random generator.
pub async fn discover_parameters<E: Borrow<Element> + Sync>(
    elements: &[E],
    options: &DiscoveryOptions,
) -> Result<Vec<ParameterDefinition>> {
    let indices = {
        let mut rng = rand::thread_rng();
        sample_indices(elements.len(), options.sample_size, &mut rng)
    };
    discover_from_indices(elements, &indices, options).await
}

/// Discovers parameters with a caller-supplied generator.
pub async fn discover_parameters_with_rng<E: Borrow<Element> + Sync, R: Rng>(
    elements: &[E],
    options: &DiscoveryOptions,
    rng: &mut R,
) -> Result<Vec<ParameterDefinition>> {
    let indices = sample_indices(elements.len(), options.sample_size, rng);
    discover_from_indices(elements, &indices, options).await
}

/// Uniform sample of distinct indices, or every index when the input fits.
fn sample_indices<R: Rng>(len: usize, sample_size: usize, rng: &mut R) -> Vec<usize> {
    if len <= sample_size {
        return (0..len).collect();
    }
    let mut picked = rand::seq::index::sample(rng, len, sample_size).into_vec();
    picked.sort_unstable();
    picked
}

async fn discover_from_indices<E: Borrow<Element> + Sync>(
    elements: &[E],
    indices: &[usize],
    options: &DiscoveryOptions,
) -> Result<Vec<ParameterDefinition>> {
    options.validate()?;
    if indices.is_empty() {
        return Ok(Vec::new());
    }

    let mut stats: FxHashMap<String, FieldStats> = FxHashMap::default();
    let batch_size = options.batch_size.max(1);
    let batches = indices.chunks(batch_size);
    let batch_count = batches.len();

    for (batch_no, batch) in batches.enumerate() {
        for &i in batch {
            let element = elements.get(i).map(<E as Borrow<Element>>::borrow).ok_or_else(|| {
                Error::Discovery(format!("sample index {} out of range ({} elements)", i, elements.len()))
            })?;
            for (field, value) in element.parameters.iter() {
                let next = stats.len();
                let entry = stats.entry(field.clone()).or_insert_with(|| FieldStats {
                    count: 0,
                    param_type: value.parameter_type(),
                    group: element
                        .parameters
                        .group_of(field)
                        .unwrap_or(PARAMETERS_GROUP)
                        .to_string(),
                    first_seen: next,
                });
                entry.count += 1;
            }
        }
        if batch_no + 1 < batch_count {
            tokio::task::yield_now().await;
        }
    }

    let total = indices.len() as f64;
    let mut found: Vec<(f64, usize, ParameterDefinition)> = stats
        .into_iter()
        .filter(|(field, _)| !options.exclude_params.contains(field))
        .filter_map(|(field, s)| {
            let frequency = s.count as f64 / total;
            if frequency < options.min_frequency {
                return None;
            }
            let param = ParameterDefinition::new(field.clone(), field, s.param_type)
                .with_category(CUSTOM_PARAMETERS)
                .with_group(s.group)
                .with_description(format!("Found on {:.0}% of sampled elements", frequency * 100.0));
            Some((frequency, s.first_seen, ParameterDefinition {
                frequency: Some(frequency),
                ..param
            }))
        })
        .collect();

    found.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.2.field.cmp(&b.2.field))
            .then_with(|| a.1.cmp(&b.1))
    });

    tracing::debug!(
        sampled = indices.len(),
        discovered = found.len(),
        min_frequency = options.min_frequency,
        "Discovered parameters"
    );

    Ok(found.into_iter().map(|(_, _, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn elements_with_foo(total: usize, with_foo: usize) -> Vec<Element> {
        (0..total)
            .map(|i| {
                let e = Element::new(format!("e{}", i), "Walls", format!("W{}", i))
                    .with_parameter("Width", 200.0);
                if i < with_foo {
                    e.with_parameter("foo", "bar")
                } else {
                    e
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn frequency_filter_threshold() {
        let elements = elements_with_foo(10, 2);

        let strict = DiscoveryOptions {
            min_frequency: 0.3,
            ..DiscoveryOptions::default()
        };
        let found = discover_parameters(&elements, &strict).await.unwrap();
        assert!(found.iter().all(|p| p.field != "foo"));

        let loose = DiscoveryOptions {
            min_frequency: 0.1,
            ..DiscoveryOptions::default()
        };
        let found = discover_parameters(&elements, &loose).await.unwrap();
        let foo = found.iter().find(|p| p.field == "foo").unwrap();
        assert_eq!(foo.frequency, Some(0.2));
        assert_eq!(foo.category.as_deref(), Some(CUSTOM_PARAMETERS));
        assert!(foo.removable);
        assert!(foo.visible);
    }

    #[tokio::test]
    async fn ordered_by_frequency_then_name() {
        let elements = elements_with_foo(10, 5);
        let found = discover_parameters(&elements, &DiscoveryOptions::default())
            .await
            .unwrap();
        let fields: Vec<_> = found.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["Width", "foo"]);
        assert_eq!(found[0].param_type, ParameterType::Number);
    }

    #[tokio::test]
    async fn excluded_fields_are_dropped() {
        let elements = elements_with_foo(4, 4);
        let options = DiscoveryOptions::default().excluding(["foo"]);
        let found = discover_parameters(&elements, &options).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn seeded_sampling_is_reproducible() {
        let elements = elements_with_foo(500, 250);
        let options = DiscoveryOptions {
            sample_size: 50,
            batch_size: 7,
            ..DiscoveryOptions::default()
        };
        let a = discover_parameters_with_rng(&elements, &options, &mut StdRng::seed_from_u64(7))
            .await
            .unwrap();
        let b = discover_parameters_with_rng(&elements, &options, &mut StdRng::seed_from_u64(7))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].field, "Width");
        assert_eq!(a[0].frequency, Some(1.0));
    }

    #[test]
    fn sample_indices_are_distinct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked = sample_indices(1000, 100, &mut rng);
        assert_eq!(picked.len(), 100);
        let unique: FxHashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 100);
        assert!(picked.iter().all(|&i| i < 1000));
        assert_eq!(sample_indices(3, 100, &mut rng), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn invalid_options_fail_whole_call() {
        let elements = elements_with_foo(3, 1);
        let options = DiscoveryOptions {
            min_frequency: 1.5,
            ..DiscoveryOptions::default()
        };
        assert!(matches!(
            discover_parameters(&elements, &options).await,
            Err(Error::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn empty_input_discovers_nothing() {
        let found = discover_parameters::<Element>(&[], &DiscoveryOptions::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
