use geo::{polygon, MultiPolygon};

use crate::field::Field;

/// Two small rectangular plots near Rahuri, Maharashtra (WGS84 lon/lat).
/// Used when no field file is given or the given one cannot be read.
pub fn demo_fields() -> Vec<Field> {
    vec![
        Field::new(
            "Demo_Field_1",
            MultiPolygon::new(vec![polygon![
                (x: 74.6400, y: 19.3900),
                (x: 74.6450, y: 19.3900),
                (x: 74.6450, y: 19.3950),
                (x: 74.6400, y: 19.3950),
                (x: 74.6400, y: 19.3900),
            ]]),
        ),
        Field::new(
            "Demo_Field_2",
            MultiPolygon::new(vec![polygon![
                (x: 74.6500, y: 19.4000),
                (x: 74.6560, y: 19.4000),
                (x: 74.6560, y: 19.4040),
                (x: 74.6500, y: 19.4040),
                (x: 74.6500, y: 19.4000),
            ]]),
        ),
    ]
}
