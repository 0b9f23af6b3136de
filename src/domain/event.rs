// ============================================================
// Layer 3 — Event Domain Types
// ============================================================
// An `ObjectBlock` holds one kind of physics object (MET,
// leptons, jets, neutrinos) for many events as a dense f32 array:
//
//   values[(event * n_objects + object) * n_fields + field]
//
// This is the unstructured form of the record arrays stored on
// disk: every named record field becomes one column.
//
// `EventSample` is what the dataset hands to Burn for a single
// event, split into model inputs and regression targets.

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

/// Dense `[events, objects, fields]` block of one object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBlock {
    pub name:      String,
    pub fields:    Vec<String>,
    pub n_events:  usize,
    pub n_objects: usize,
    pub values:    Vec<f32>,
}

impl ObjectBlock {
    /// Wrap flat row-major values; the event count is inferred.
    pub fn new(
        name:      impl Into<String>,
        fields:    Vec<String>,
        n_objects: usize,
        values:    Vec<f32>,
    ) -> Result<Self, DataError> {
        let name   = name.into();
        let stride = n_objects * fields.len();

        if stride == 0 {
            if !values.is_empty() {
                return Err(DataError::ShapeMismatch {
                    block:  name,
                    detail: "values present but no objects or fields".into(),
                });
            }
            return Ok(Self { name, fields, n_events: 0, n_objects, values });
        }

        if values.len() % stride != 0 {
            return Err(DataError::ShapeMismatch {
                block:  name,
                detail: format!(
                    "{} values is not a multiple of {} objects x {} fields",
                    values.len(), n_objects, fields.len()
                ),
            });
        }

        let n_events = values.len() / stride;
        Ok(Self { name, fields, n_events, n_objects, values })
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// Number of values per event.
    pub fn stride(&self) -> usize {
        self.n_objects * self.fields.len()
    }

    fn offset(&self, event: usize, object: usize) -> usize {
        (event * self.n_objects + object) * self.fields.len()
    }

    pub fn get(&self, event: usize, object: usize, field: usize) -> f32 {
        self.values[self.offset(event, object) + field]
    }

    pub fn object(&self, event: usize, object: usize) -> &[f32] {
        let start = self.offset(event, object);
        &self.values[start..start + self.fields.len()]
    }

    pub fn object_mut(&mut self, event: usize, object: usize) -> &mut [f32] {
        let start = self.offset(event, object);
        let width = self.fields.len();
        &mut self.values[start..start + width]
    }

    pub fn event(&self, event: usize) -> &[f32] {
        let stride = self.stride();
        &self.values[event * stride..(event + 1) * stride]
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Like `field_index` but reports which block was missing the field.
    pub fn require_field(&self, field: &str) -> Result<usize, DataError> {
        self.field_index(field).ok_or_else(|| DataError::MissingField {
            block: self.name.clone(),
            field: field.to_string(),
        })
    }

    /// Keep only the listed field columns, in the given order.
    pub fn select_fields(&self, indices: &[usize]) -> Result<Self, DataError> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_fields()) {
            return Err(DataError::ShapeMismatch {
                block:  self.name.clone(),
                detail: format!("field index {bad} out of range for {} fields", self.n_fields()),
            });
        }

        let fields = indices.iter().map(|&i| self.fields[i].clone()).collect();
        let mut values = Vec::with_capacity(self.n_events * self.n_objects * indices.len());
        for e in 0..self.n_events {
            for o in 0..self.n_objects {
                let row = self.object(e, o);
                values.extend(indices.iter().map(|&i| row[i]));
            }
        }

        Ok(Self {
            name: self.name.clone(),
            fields,
            n_events: self.n_events,
            n_objects: self.n_objects,
            values,
        })
    }

    /// Stack blocks from several files along the event axis.
    ///
    /// All blocks must agree on field names and objects per event.
    pub fn concat(blocks: Vec<Self>) -> Result<Self, DataError> {
        let mut iter = blocks.into_iter();
        let mut out  = iter.next().ok_or(DataError::EmptyDataset)?;

        for block in iter {
            if block.fields != out.fields {
                return Err(DataError::ShapeMismatch {
                    block:  out.name.clone(),
                    detail: format!("fields {:?} differ from {:?}", block.fields, out.fields),
                });
            }
            if block.n_objects != out.n_objects {
                return Err(DataError::ShapeMismatch {
                    block:  out.name.clone(),
                    detail: format!(
                        "{} objects per event differs from {}",
                        block.n_objects, out.n_objects
                    ),
                });
            }
            out.n_events += block.n_events;
            out.values.extend(block.values);
        }

        Ok(out)
    }

    /// Copy out the listed events, in order.
    pub fn gather(&self, events: &[usize]) -> Self {
        let mut values = Vec::with_capacity(events.len() * self.stride());
        for &e in events {
            values.extend_from_slice(self.event(e));
        }
        Self {
            name:      self.name.clone(),
            fields:    self.fields.clone(),
            n_events:  events.len(),
            n_objects: self.n_objects,
            values,
        }
    }

    /// Rearrange the objects of one event: slot `i` receives old slot `order[i]`.
    pub fn reorder_objects(&mut self, event: usize, order: &[usize]) {
        let old = self.event(event).to_vec();
        let width    = self.n_fields();
        for (slot, &src) in order.iter().enumerate() {
            self.object_mut(event, slot)
                .copy_from_slice(&old[src * width..(src + 1) * width]);
        }
    }
}

// ─── Samples ──────────────────────────────────────────────────────────────────

/// Model inputs for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInputs {
    /// `[njets, nbjets]`
    pub misc:     Vec<f32>,
    pub met:      Vec<f32>,
    /// One row per lepton, particle first.
    pub leptons:  Vec<Vec<f32>>,
    /// One row per jet slot, zero rows are padding.
    pub jets:     Vec<Vec<f32>>,
    /// `true` for real jets, `false` for padding.
    pub jet_mask: Vec<bool>,
}

/// Regression targets for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTargets {
    pub neutrino:     Vec<f32>,
    pub antineutrino: Vec<f32>,
}

/// One dataset item: `(inputs, targets)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSample {
    pub inputs:  EventInputs,
    pub targets: EventTargets,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn block(n_objects: usize, values: Vec<f32>) -> ObjectBlock {
        ObjectBlock::new("jets", vec!["a".into(), "b".into()], n_objects, values).unwrap()
    }

    #[test]
    fn test_infers_event_count() {
        let b = block(2, (0..12).map(|v| v as f32).collect());
        assert_eq!(b.n_events, 3);
        assert_eq!(b.get(1, 1, 0), 6.0);
        assert_eq!(b.object(2, 0), &[8.0, 9.0]);
    }

    #[test]
    fn test_rejects_ragged_values() {
        let err = ObjectBlock::new("jets", vec!["a".into(), "b".into()], 2, vec![0.0; 5]);
        assert!(matches!(err, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_select_fields_reorders_columns() {
        let b = block(1, vec![1.0, 2.0, 3.0, 4.0]);
        let s = b.select_fields(&[1]).unwrap();
        assert_eq!(s.fields, vec!["b".to_string()]);
        assert_eq!(s.values, vec![2.0, 4.0]);
        assert!(b.select_fields(&[2]).is_err());
    }

    #[test]
    fn test_concat_checks_object_count() {
        let a = block(2, vec![0.0; 4]);
        let b = block(1, vec![0.0; 2]);
        assert!(ObjectBlock::concat(vec![a.clone(), b]).is_err());

        let joined = ObjectBlock::concat(vec![a.clone(), a]).unwrap();
        assert_eq!(joined.n_events, 2);
    }

    #[test]
    fn test_concat_of_nothing_is_empty_error() {
        assert!(matches!(ObjectBlock::concat(Vec::new()), Err(DataError::EmptyDataset)));
    }

    #[test]
    fn test_reorder_objects_swaps_slots() {
        let mut b = block(2, vec![1.0, 2.0, 3.0, 4.0]);
        b.reorder_objects(0, &[1, 0]);
        assert_eq!(b.values, vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_gather_picks_events() {
        let b = block(1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let g = b.gather(&[2, 0]);
        assert_eq!(g.values, vec![5.0, 6.0, 1.0, 2.0]);
        assert_eq!(g.n_events, 2);
    }
}
