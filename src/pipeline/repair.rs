//! Geometry repair before export.

use crate::table::FeatureCollection;
use serde::Serialize;
use tracing::{debug, warn};

/// A row whose geometry could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub row: usize,
    pub code: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub table: FeatureCollection,
    /// Codes of rows that received a reference geometry
    pub repaired: Vec<String>,
    pub unresolved: Vec<RowDiagnostic>,
}

/// Give every row with a missing or invalid geometry the reference geometry of its code.
///
/// Rows whose bounds can be computed pass through untouched. Rows without a usable
/// reference keep their geometry and are reported in `unresolved`.
pub fn repair_geometries(
    table: FeatureCollection,
    references: &FeatureCollection,
    id_attribute: &str,
) -> RepairOutcome {
    let mut repaired = Vec::new();
    let mut unresolved = Vec::new();
    let mut features = table.features;

    for (row, feature) in features.iter_mut().enumerate() {
        let check = match feature.geometry.as_ref() {
            Some(geometry) => geometry.bounds().map(|_| ()),
            None => Err(crate::error::GeometryError::Missing),
        };
        let Err(problem) = check else {
            continue;
        };

        let code = feature.get_str(id_attribute);
        let reference = code
            .as_deref()
            .and_then(|c| references.find_by(id_attribute, c))
            .and_then(|f| f.geometry.as_ref())
            .filter(|g| g.bounds().is_ok());

        match (reference, code) {
            (Some(geometry), Some(code)) => {
                debug!(row, code = %code, reason = %problem, "Substituted reference geometry");
                feature.geometry = Some(geometry.clone());
                repaired.push(code);
            }
            (_, code) => {
                warn!(row, code = ?code, reason = %problem, "No reference geometry for row");
                unresolved.push(RowDiagnostic {
                    row,
                    code,
                    reason: problem.to_string(),
                });
            }
        }
    }

    RepairOutcome {
        table: FeatureCollection { features },
        repaired,
        unresolved,
    }
}
