use quire_common::ModelResult;
use serde::{Deserialize, Serialize};

use super::{next_version, AffectedSelectable, Operation, OperationBehavior, OperationJson};
use crate::document::Document;
use crate::range::{Range, RangeJson};
use crate::tree::Tree;

/// Adds, moves or removes a marker managed through operations.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOperation {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    pub affects_data: bool,
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOperationJson {
    pub base_version: Option<u64>,
    pub name: String,
    pub old_range: Option<RangeJson>,
    pub new_range: Option<RangeJson>,
    #[serde(default)]
    pub affects_data: bool,
}

impl MarkerOperation {
    pub fn new(name: impl Into<String>, old_range: Option<Range>, new_range: Option<Range>, affects_data: bool, base_version: Option<u64>) -> Self {
        Self {
            name: name.into(),
            old_range,
            new_range,
            affects_data,
            base_version,
        }
    }

    pub fn from_json(json: MarkerOperationJson, document: &Document) -> ModelResult<Self> {
        let old_range = json.old_range.as_ref().map(|range| Range::from_json(range, document)).transpose()?;
        let new_range = json.new_range.as_ref().map(|range| Range::from_json(range, document)).transpose()?;
        Ok(Self::new(json.name, old_range, new_range, json.affects_data, json.base_version))
    }
}

impl OperationBehavior for MarkerOperation {
    fn type_name(&self) -> &'static str {
        "marker"
    }

    fn base_version(&self) -> Option<u64> {
        self.base_version
    }

    fn set_base_version(&mut self, version: Option<u64>) {
        self.base_version = version;
    }

    fn affected_selectable(&self, _tree: &Tree) -> Option<AffectedSelectable> {
        let ranges: Vec<Range> = self.old_range.iter().chain(self.new_range.iter()).cloned().collect();
        (!ranges.is_empty()).then_some(AffectedSelectable::Ranges(ranges))
    }

    fn validate(&self, _document: &Document) -> ModelResult<()> {
        Ok(())
    }

    fn execute(&mut self, document: &mut Document) -> ModelResult<()> {
        let markers = document.markers_mut();
        match &self.new_range {
            Some(range) => {
                markers.set(self.name.clone(), range.clone(), true, self.affects_data);
            }
            None => {
                markers.remove(&self.name);
            }
        }
        Ok(())
    }

    fn get_reversed(&self) -> Operation {
        Operation::Marker(MarkerOperation::new(
            self.name.clone(),
            self.new_range.clone(),
            self.old_range.clone(),
            self.affects_data,
            next_version(self.base_version),
        ))
    }

    fn to_json(&self, tree: &Tree) -> OperationJson {
        OperationJson::Marker(MarkerOperationJson {
            base_version: self.base_version,
            name: self.name.clone(),
            old_range: self.old_range.as_ref().map(|range| range.to_json(tree)),
            new_range: self.new_range.as_ref().map(|range| range.to_json(tree)),
            affects_data: self.affects_data,
        })
    }
}
