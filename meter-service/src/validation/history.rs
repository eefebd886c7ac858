use meter_client::domain::MeterReading;

/// Mean of adjacent deltas (newer minus older) for `field` across `window`.
///
/// `window` is ordered newest first. Pairs where either reading lacks the
/// field are skipped; `None` when the window has fewer than two readings or
/// no usable pair.
pub fn average_delta(window: &[MeterReading], field: &str) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }

    let deltas: Vec<f64> = window
        .windows(2)
        .filter_map(|pair| match (pair[0].value(field), pair[1].value(field)) {
            (Some(newer), Some(older)) => Some(newer - older),
            _ => None,
        })
        .collect();

    if deltas.is_empty() {
        return None;
    }

    Some(deltas.iter().sum::<f64>() / deltas.len() as f64)
}
