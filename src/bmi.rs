// ⚖️ BMI Derivation
//
//   bmi = weight_kg / (height_cm / 100)^2
//
// Rounded half-to-even, so 22.5 -> 22 and 23.5 -> 24.

/// Derive body-mass index from weight (kg) and height (cm).
///
/// Returns `None` when either input is absent or not strictly positive.
/// Never fails.
///
/// ```
/// use patient_merge::derive_bmi;
///
/// assert_eq!(derive_bmi(Some(70.0), Some(175.0)), Some(23));
/// assert_eq!(derive_bmi(None, Some(175.0)), None);
/// ```
pub fn derive_bmi(weight_kg: Option<f64>, height_cm: Option<f64>) -> Option<u32> {
    let weight = weight_kg.filter(|w| *w > 0.0)?;
    let height_m = height_cm.filter(|h| *h > 0.0)? / 100.0;

    let bmi = (weight / (height_m * height_m)).round_ties_even();
    if !bmi.is_finite() || bmi > u32::MAX as f64 {
        return None;
    }

    Some(bmi as u32)
}
