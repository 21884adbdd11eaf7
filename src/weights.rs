// Pure functions over `(name -> weight)` maps, shared by the background
// traffic reconciler and the standalone `traffic` switch CLI.
// Kept dependency-free and side-effect-free so both callers are guaranteed
// to agree, and so the invariants are directly testable.

use std::collections::HashMap;

use crate::error::WeightError;

/// An ordered `(name, weight)` list. Order is preserved end-to-end so two
/// callers normalizing the same input produce byte-identical output: the
/// background loop and the switch helper must never disagree on a weight
/// map for the same input.
pub type WeightMap = Vec<(String, f64)>;

const EPSILON: f64 = 1e-9;

/// True iff every weight is `<= 0`. An empty map is vacuously all-zero.
pub fn all_zero(weights: &[(String, f64)]) -> bool {
    weights.iter().all(|(_, w)| *w <= 0.0)
}

fn sum(weights: &[(String, f64)]) -> f64 {
    weights.iter().map(|(_, w)| w).sum()
}

/// Normalize a weight map so it sums to 100.
///
/// - Empty input returns empty output.
/// - All-zero, non-empty input returns an equal share per entry.
/// - Otherwise each entry gets `weight_i * 100 / sum(weights)`.
pub fn normalize(weights: &[(String, f64)]) -> WeightMap {
    if weights.is_empty() {
        return Vec::new();
    }
    if all_zero(weights) {
        let share = 100.0 / weights.len() as f64;
        return weights.iter().map(|(name, _)| (name.clone(), share)).collect();
    }
    let total = sum(weights);
    weights.iter().map(|(name, w)| (name.clone(), w * 100.0 / total)).collect()
}

/// Set `name`'s weight to `target` and rescale every other entry
/// proportionally so the map still sums to 100.
///
/// Fails with [`WeightError::SoleBackend`] when `target < 100` and `name` is
/// currently the only entry carrying non-zero weight — relaxing the sole
/// backend is ambiguous (there is nothing to redistribute the remainder to).
pub fn set_weight(weights: &[(String, f64)], name: &str, target: f64) -> Result<WeightMap, WeightError> {
    if !weights.iter().any(|(n, _)| n == name) {
        return Err(WeightError::UnknownStack(name.to_string()));
    }
    let current = weights.iter().find(|(n, _)| n == name).map(|(_, w)| *w).unwrap_or(0.0);

    let others_nonzero = weights.iter().any(|(n, w)| n != name && *w > 0.0);
    if target < 100.0 && !others_nonzero {
        return Err(WeightError::SoleBackend { name: name.to_string() });
    }

    let denom = 100.0 - current;
    let scale = if denom.abs() < EPSILON { 0.0 } else { (100.0 - target) / denom };

    let rescaled: WeightMap = weights
        .iter()
        .map(|(n, w)| if n == name { (n.clone(), target) } else { (n.clone(), w * scale) })
        .collect();
    Ok(normalize(&rescaled))
}

/// Serialize a weight map the way ingress/routegroup traffic-weight
/// annotations expect it: a JSON object `{stackName: weight, ...}`, not an
/// array of pairs.
pub fn to_annotation_json(weights: &[(String, f64)]) -> String {
    let map: HashMap<&str, f64> = weights.iter().map(|(n, w)| (n.as_str(), *w)).collect();
    serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
}

/// Parse a `{stackName: weight}` JSON object back into a weight map. `None`
/// on malformed input; callers treat that the same as the annotation being
/// absent.
pub fn from_annotation_json(raw: &str) -> Option<WeightMap> {
    let map: HashMap<String, f64> = serde_json::from_str(raw).ok()?;
    Some(map.into_iter().collect())
}
