use super::micrograph::Catalog;

/// Convert the staged raw doses into percent transmission.
///
/// Each dose is scaled by the largest dose of the session, so the brightest micrograph
/// reads 100. Only `raw_dose` is read, so running this twice gives the same result.
/// Returns the maximum dose used, or None if there was nothing to normalize by.
pub fn normalize_transmission(catalog: &mut Catalog) -> Option<f64> {
    let max_raw_dose = catalog
        .iter()
        .filter_map(|r| usable_dose(r.raw_dose))
        .fold(None, |max: Option<f64>, dose| match max {
            Some(m) if m >= dose => Some(m),
            _ => Some(dose),
        });

    let max_raw_dose = match max_raw_dose {
        Some(m) if m.is_finite() && m > 0.0 => m,
        Some(m) => {
            log::warn!("Maximum dose on camera is {m}; percent transmission cannot be computed");
            clear_transmission(catalog);
            return None;
        }
        None => {
            log::warn!("No micrograph has a dose on camera; percent transmission is undefined");
            clear_transmission(catalog);
            return None;
        }
    };

    for record in catalog.records.iter_mut() {
        record.percent_transmission =
            usable_dose(record.raw_dose).map(|dose| 100.0 * dose / max_raw_dose);
    }
    log::info!("Normalized transmission to a maximum dose of {max_raw_dose}");
    Some(max_raw_dose)
}

/// A dose counts only if it is a finite, non-negative reading
fn usable_dose(dose: Option<f64>) -> Option<f64> {
    dose.filter(|d| d.is_finite() && *d >= 0.0)
}

fn clear_transmission(catalog: &mut Catalog) {
    for record in catalog.records.iter_mut() {
        record.percent_transmission = None;
    }
}
