/// Arithmetic mean; `None` for an empty slice
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation; `None` for an empty slice
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

/// Population standard deviation over the mean; `None` when the mean is not positive
pub fn coefficient_of_variation(data: &[f64]) -> Option<f64> {
    match (mean(data), std_dev(data)) {
        (Some(m), Some(sd)) if m > 0.0 => Some(sd / m),
        _ => None,
    }
}
