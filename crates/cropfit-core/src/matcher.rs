use crate::rules::CropRule;

/// Crops whose tolerances cover the field's average salinity and slope.
///
/// Both thresholds are inclusive. Output follows table order and keeps
/// duplicate rows. Averages are compared unrounded.
pub fn recommend(avg_salinity: f64, avg_slope: f64, rules: &[CropRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| avg_salinity <= rule.ec_max && avg_slope <= rule.slope_max)
        .map(|rule| rule.crop.clone())
        .collect()
}
