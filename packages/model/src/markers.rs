//! # Markers
//!
//! Named ranges tracked alongside the content. Marker ranges follow every
//! applied operation the same way the selection does.

use std::collections::BTreeMap;

use crate::operation::Operation;
use crate::position::Position;
use crate::range::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub range: Range,
    /// Changed through marker operations, so it is part of the operation log.
    pub managed_using_operation: bool,
    /// Counts as content and belongs to the serialized data.
    pub affects_data: bool,
}

/// A marker was added, moved or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerUpdate {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerCollection {
    markers: BTreeMap<String, Marker>,
    updates: Vec<MarkerUpdate>,
}

impl MarkerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Markers whose name starts with `prefix:` or equals `prefix`.
    pub fn get_markers_group<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| {
            marker.name == prefix || marker.name.strip_prefix(prefix).is_some_and(|rest| rest.starts_with(':'))
        })
    }

    /// Markers whose range contains `position` (ends included).
    pub fn get_markers_at_position<'a>(&'a self, position: &'a Position) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| marker.range.contains_position(position) || marker.range.start == *position || marker.range.end == *position)
    }

    pub fn get_markers_intersecting_range<'a>(&'a self, range: &'a Range) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| marker.range.root() == range.root() && marker.range.is_intersecting(range))
    }

    /// Add or update a marker. Returns false when nothing changed.
    pub fn set(&mut self, name: impl Into<String>, range: Range, managed_using_operation: bool, affects_data: bool) -> bool {
        let name = name.into();
        let old_range = match self.markers.get_mut(&name) {
            Some(marker) => {
                let unchanged = marker.range == range
                    && marker.managed_using_operation == managed_using_operation
                    && marker.affects_data == affects_data;
                if unchanged {
                    return false;
                }
                let old = std::mem::replace(&mut marker.range, range.clone());
                marker.managed_using_operation = managed_using_operation;
                marker.affects_data = affects_data;
                Some(old)
            }
            None => {
                self.markers.insert(
                    name.clone(),
                    Marker {
                        name: name.clone(),
                        range: range.clone(),
                        managed_using_operation,
                        affects_data,
                    },
                );
                None
            }
        };
        self.updates.push(MarkerUpdate {
            name,
            old_range,
            new_range: Some(range),
        });
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.markers.remove(name) {
            Some(marker) => {
                self.updates.push(MarkerUpdate {
                    name: marker.name,
                    old_range: Some(marker.range),
                    new_range: None,
                });
                true
            }
            None => false,
        }
    }

    /// Move every marker range through an applied operation.
    pub(crate) fn transform(&mut self, operation: &Operation) {
        for marker in self.markers.values_mut() {
            let range = marker.range.get_transformed_by_operation(operation);
            if range != marker.range {
                let old = std::mem::replace(&mut marker.range, range.clone());
                self.updates.push(MarkerUpdate {
                    name: marker.name.clone(),
                    old_range: Some(old),
                    new_range: Some(range),
                });
            }
        }
    }

    pub(crate) fn take_updates(&mut self) -> Vec<MarkerUpdate> {
        std::mem::take(&mut self.updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Position::from_parts(NodeId(1), vec![start]), Position::from_parts(NodeId(1), vec![end]))
    }

    #[test]
    fn test_set_records_updates_only_on_change() {
        let mut markers = MarkerCollection::new();
        assert!(markers.set("comment:1", range(0, 2), true, true));
        assert!(!markers.set("comment:1", range(0, 2), true, true));
        assert!(markers.set("comment:1", range(1, 2), true, true));

        let updates = markers.take_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].old_range, Some(range(0, 2)));
        assert!(markers.take_updates().is_empty());
    }

    #[test]
    fn test_groups_and_lookup() {
        let mut markers = MarkerCollection::new();
        markers.set("comment:1", range(0, 2), false, false);
        markers.set("comment:2", range(3, 4), false, false);
        markers.set("commentary", range(0, 1), false, false);

        assert_eq!(markers.get_markers_group("comment").count(), 2);
        let at = Position::from_parts(NodeId(1), vec![2]);
        let names: Vec<&str> = markers.get_markers_at_position(&at).map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["comment:1"]);

        assert!(markers.remove("comment:2"));
        assert!(!markers.remove("comment:2"));
        assert_eq!(markers.len(), 2);
    }
}
