//! Per-year population statistics for the overview panel.

use std::collections::HashMap;

use density_map_area_models::{AreaPopulation, AreaTable, PopulationChange, PopulationOverview};

use crate::DatasetError;

/// Summarizes the population of every area for `year`.
///
/// Cells that are missing or invalid are left out of every statistic.
/// Year-over-year figures are only filled in when `year - 1` is also a
/// column of the table.
///
/// # Errors
///
/// Returns [`DatasetError::MissingColumn`] if `year` is not a column.
#[allow(clippy::cast_precision_loss)]
pub fn population_overview(
    table: &AreaTable,
    year: i32,
) -> Result<PopulationOverview, DatasetError> {
    if !table.has_year(year) {
        return Err(DatasetError::MissingColumn {
            column: year.to_string(),
        });
    }

    let mut ranked: Vec<AreaPopulation> = table
        .areas
        .iter()
        .filter_map(|a| {
            a.population(year).map(|population| AreaPopulation {
                area_id: a.area_id.clone(),
                population,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.population.total_cmp(&a.population));

    let total: f64 = ranked.iter().map(|a| a.population).sum();
    let mean = if ranked.is_empty() {
        0.0
    } else {
        total / ranked.len() as f64
    };

    let previous = year - 1;
    let has_previous = table.has_year(previous);

    let total_delta = has_previous.then(|| {
        let previous_total: f64 = table.areas.iter().filter_map(|a| a.population(previous)).sum();
        total - previous_total
    });

    let mut changes: Vec<PopulationChange> = if has_previous {
        table
            .areas
            .iter()
            .filter_map(|a| {
                let now = a.population(year)?;
                let before = a.population(previous)?;
                Some(PopulationChange {
                    area_id: a.area_id.clone(),
                    population: now,
                    difference: now - before,
                })
            })
            .collect()
    } else {
        Vec::new()
    };
    changes.sort_by(|a, b| b.difference.total_cmp(&a.difference));

    Ok(PopulationOverview {
        year,
        mode: mode(ranked.iter().map(|a| a.population)),
        ranked,
        total,
        total_delta,
        mean,
        largest_increase: changes.first().cloned(),
        largest_decrease: changes.last().cloned(),
    })
}

/// Most frequent value; the smallest wins ties.
fn mode(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.to_bits()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(bits, count)| (f64::from_bits(bits), count))
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(v, _)| v)
}
