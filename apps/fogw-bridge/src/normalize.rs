use crate::decode::RawField;
use crate::fields::FieldTable;
use crate::record::{CanonicalReading, Quantity};
use crate::units::{convert, Unit, UnitSystem};
use std::collections::HashSet;
use std::sync::Arc;

/// Per-cycle normalization result. The counters are diagnostics, not errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub readings: Vec<CanonicalReading>,
    pub unknown: usize,
    pub sentinels: usize,
    pub anomalies: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    table: Arc<FieldTable>,
    unit_system: UnitSystem,
}

impl Normalizer {
    pub fn new(table: Arc<FieldTable>, unit_system: UnitSystem) -> Self {
        Self { table, unit_system }
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.unit_system
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn normalize(&self, fields: &[RawField]) -> Normalized {
        let mut out = Normalized::default();
        let mut seen: HashSet<Quantity> = HashSet::new();

        for field in fields {
            let Some(spec) = self.table.get(&field.id) else {
                out.unknown += 1;
                continue;
            };

            if spec.is_sentinel(field.value) {
                tracing::debug!(field = %field.id, raw = field.value, "sensor not reporting");
                out.sentinels += 1;
                continue;
            }

            // The printed unit wins over the table's assumption when it describes the same
            // dimension; gateways follow whatever display units the owner configured.
            let source = match field.unit.as_deref().map(|hint| (hint, Unit::from_hint(hint))) {
                Some((_, Some(unit))) if unit.dimension() == spec.unit.dimension() => unit,
                Some((hint, _)) => {
                    tracing::debug!(field = %field.id, hint, "ignoring unrecognized unit hint");
                    spec.unit
                }
                None => spec.unit,
            };

            let scaled = field.value * spec.scale;
            let Some(mut value) = convert(scaled, source, spec.unit) else {
                continue;
            };
            if !spec.in_range(value) {
                tracing::debug!(
                    field = %field.id,
                    quantity = %spec.quantity,
                    value,
                    min = spec.min,
                    max = spec.max,
                    "dropping implausible reading"
                );
                out.anomalies += 1;
                continue;
            }
            if spec.quantity == Quantity::WindDirection {
                value = value.rem_euclid(360.0);
            }

            let unit = spec.quantity.canonical_unit(self.unit_system);
            let Some(value) = convert(value, spec.unit, unit) else {
                continue;
            };

            if !seen.insert(spec.quantity) {
                out.duplicates += 1;
                continue;
            }
            out.readings.push(CanonicalReading {
                quantity: spec.quantity,
                value: round_reading(value),
                unit,
            });
        }

        out
    }
}

// Strips binary floating-point noise from fixed-point scaling (235 * 0.1 and friends).
fn round_reading(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
