//! Per-render chart element description

use indexmap::IndexMap;

use crate::snapshot::TabularSnapshot;

/// Well-known dataset name used when a producer does not name its data.
pub const DEFAULT_DATASET_NAME: &str = "source";

/// A named auxiliary dataset attached to a chart element
#[derive(Clone, Debug)]
pub struct NamedDataset {
    /// Producer-assigned name; falls back to the sentinel when unset
    pub name: Option<String>,

    /// The dataset rows
    pub data: TabularSnapshot,
}

impl NamedDataset {
    pub fn new(name: impl Into<String>, data: TabularSnapshot) -> Self {
        Self {
            name: Some(name.into()),
            data,
        }
    }

    pub fn unnamed(data: TabularSnapshot) -> Self {
        Self { name: None, data }
    }

    /// The name this dataset is addressed by inside the view
    pub fn effective_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DATASET_NAME)
    }
}

/// Immutable-per-render description of one chart.
///
/// Identity for diffing purposes is `id`; content identity for data
/// purposes is the snapshot handle plus its shape.
#[derive(Clone, Debug)]
pub struct ChartElement {
    /// Stable identity, also the persistence key for selection state
    pub id: String,

    /// Raw declarative spec, serialized as JSON
    pub spec: String,

    /// Theming mode requested by the producer
    pub theme: String,

    /// Whether the chart stretches to its container width
    pub use_container_width: bool,

    /// Primary data snapshot
    pub data: Option<TabularSnapshot>,

    /// Ordered auxiliary datasets
    pub datasets: Vec<NamedDataset>,

    /// Active selection parameter names
    pub selection_mode: Vec<String>,

    /// Enclosing form, when any
    pub form_id: Option<String>,
}

/// The snapshots of one render pass, keyed the way the view addresses them.
///
/// Retained by the chart instance as the previous-render pointer; never
/// stored in ambient state.
#[derive(Clone, Debug, Default)]
pub struct SnapshotSet {
    /// The primary snapshot, reconciled under the default dataset name
    pub primary: Option<TabularSnapshot>,

    /// Named datasets in arrival order
    pub named: IndexMap<String, TabularSnapshot>,
}

impl SnapshotSet {
    pub fn from_element(element: &ChartElement) -> Self {
        let mut named = IndexMap::new();
        for dataset in &element.datasets {
            named.insert(dataset.effective_name().to_string(), dataset.data.clone());
        }
        Self {
            primary: element.data.clone(),
            named,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn snapshot(values: &[i64]) -> TabularSnapshot {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values.to_vec()))])
                .unwrap();
        TabularSnapshot::new(batch)
    }

    #[test]
    fn test_effective_name_falls_back_to_sentinel() {
        assert_eq!(NamedDataset::unnamed(snapshot(&[1])).effective_name(), "source");
        assert_eq!(
            NamedDataset {
                name: Some(String::new()),
                data: snapshot(&[1]),
            }
            .effective_name(),
            "source"
        );
        assert_eq!(
            NamedDataset::new("clicks", snapshot(&[1])).effective_name(),
            "clicks"
        );
    }

    #[test]
    fn test_snapshot_set_keeps_arrival_order() {
        let element = ChartElement {
            id: "chart-1".to_string(),
            spec: "{}".to_string(),
            theme: String::new(),
            use_container_width: false,
            data: Some(snapshot(&[1, 2])),
            datasets: vec![
                NamedDataset::new("zulu", snapshot(&[1])),
                NamedDataset::new("alpha", snapshot(&[2])),
            ],
            selection_mode: vec![],
            form_id: None,
        };

        let set = SnapshotSet::from_element(&element);
        let names: Vec<&str> = set.named.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["zulu", "alpha"]);
        assert_eq!(set.primary.unwrap().row_count(), 2);
    }
}
