use std::collections::HashSet;

use geo::MultiPolygon;
use log::warn;

/// A named field boundary. Multi-part fields and holes are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

impl Field {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
        }
    }
}

/// A polygon feature as read from a vector file, before ids are settled.
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// 0-based position of the feature in the source file.
    pub index: usize,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Turn raw features into fields with run-unique ids.
///
/// A missing or blank name becomes `Field_{index}`. Repeated ids get a
/// `_2`, `_3`, … suffix in encounter order.
pub fn assign_ids(features: Vec<RawFeature>) -> Vec<Field> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut fields = Vec::with_capacity(features.len());

    for feature in features {
        let base = feature
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Field_{}", feature.index));

        let mut id = base.clone();
        let mut n = 1;
        while taken.contains(&id) {
            n += 1;
            id = format!("{base}_{n}");
        }
        if n > 1 {
            warn!("Duplicate field id {base:?}; renamed to {id:?}");
        }
        taken.insert(id.clone());
        fields.push(Field::new(id, feature.geometry));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]])
    }

    fn raw(index: usize, name: Option<&str>) -> RawFeature {
        RawFeature {
            index,
            name: name.map(String::from),
            geometry: square(),
        }
    }

    fn ids(fields: &[Field]) -> Vec<&str> {
        fields.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn missing_names_get_index_ids() {
        let fields = assign_ids(vec![raw(0, None), raw(1, Some("  ")), raw(2, Some("North"))]);
        assert_eq!(ids(&fields), vec!["Field_0", "Field_1", "North"]);
    }

    #[test]
    fn duplicates_are_suffixed_in_order() {
        let fields = assign_ids(vec![
            raw(0, Some("Plot")),
            raw(1, Some("Plot")),
            raw(2, Some("Plot")),
            raw(3, Some("Other")),
        ]);
        assert_eq!(ids(&fields), vec!["Plot", "Plot_2", "Plot_3", "Other"]);
    }

    #[test]
    fn suffix_skips_ids_already_taken() {
        let fields = assign_ids(vec![raw(0, Some("A_2")), raw(1, Some("A")), raw(2, Some("A"))]);
        assert_eq!(ids(&fields), vec!["A_2", "A", "A_3"]);
    }
}
