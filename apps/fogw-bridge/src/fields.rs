//! Raw gateway field ids -> semantic quantities.
//!
//! The mapping is data: the built-in table below covers the live-data ids of the
//! GW1000/GW1100/GW2000 family plus the flat register-style keys, and a JSON file can add
//! or override entries for hardware the table does not know yet:
//!
//! ```json
//! {
//!   "fields": {
//!     "0x02": { "min": -50, "max": 60 },
//!     "0x2a": { "quantity": "solar_radiation", "unit": "klux", "min": 0, "max": 200 }
//!   },
//!   "remove": ["0x19"]
//! }
//! ```

use crate::record::Quantity;
use crate::units::Unit;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// How one raw field is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub quantity: Quantity,
    /// Unit of `raw * scale` when the gateway prints no unit of its own.
    pub unit: Unit,
    pub scale: f64,
    /// Raw values (before scaling) meaning "sensor not installed".
    pub sentinels: Vec<f64>,
    /// Plausible range, expressed in `unit`.
    pub min: f64,
    pub max: f64,
}

impl FieldSpec {
    pub fn is_sentinel(&self, raw: f64) -> bool {
        self.sentinels
            .iter()
            .any(|sentinel| (sentinel - raw).abs() < 1e-9)
    }

    pub fn in_range(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, id: &str) -> Result<()> {
        if self.quantity == Quantity::Rain {
            bail!("field '{id}': rain is derived from the cumulative counters and cannot be mapped");
        }
        if self.unit.dimension() != self.quantity.dimension() {
            bail!(
                "field '{id}': unit {} cannot express {}",
                self.unit,
                self.quantity
            );
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            bail!("field '{id}': scale must be a finite, non-zero number");
        }
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            bail!("field '{id}': min {} exceeds max {}", self.min, self.max);
        }
        Ok(())
    }
}

struct Builtin {
    id: &'static str,
    quantity: Quantity,
    unit: Unit,
    scale: f64,
    sentinels: &'static [f64],
    min: f64,
    max: f64,
}

const NONE: &[f64] = &[];
const TENTHS_TEMP_NONE: &[f64] = &[-1000.0, 32767.0];
const U8_NONE: &[f64] = &[255.0];
const U16_NONE: &[f64] = &[65535.0];
const U32_NONE: &[f64] = &[4_294_967_295.0];

macro_rules! field {
    ($id:expr, $quantity:ident, $unit:ident, $scale:expr, $sentinels:expr, $min:expr, $max:expr) => {
        Builtin {
            id: $id,
            quantity: Quantity::$quantity,
            unit: Unit::$unit,
            scale: $scale,
            sentinels: $sentinels,
            min: $min,
            max: $max,
        }
    };
}

#[rustfmt::skip]
const BUILTIN_FIELDS: &[Builtin] = &[
    // Live-data sections (`common_list`, `rain`, `piezoRain`): decimal values, unit printed inline.
    field!("0x02", OutdoorTemperature, Celsius,   1.0, NONE, -80.0, 80.0),
    field!("0x07", OutdoorHumidity,    Percent,   1.0, NONE, 0.0, 100.0),
    field!("0x03", Dewpoint,           Celsius,   1.0, NONE, -80.0, 80.0),
    field!("0x04", Windchill,          Celsius,   1.0, NONE, -80.0, 80.0),
    field!("0x05", HeatIndex,          Celsius,   1.0, NONE, -80.0, 100.0),
    field!("3",    FeelsLike,          Celsius,   1.0, NONE, -80.0, 100.0),
    field!("0x0a", WindDirection,      Degree,    1.0, NONE, 0.0, 360.0),
    field!("0x0b", WindSpeed,          KmPerHour, 1.0, NONE, 0.0, 720.0),
    field!("0x0c", WindGust,           KmPerHour, 1.0, NONE, 0.0, 720.0),
    field!("0x19", MaxDailyGust,       KmPerHour, 1.0, NONE, 0.0, 720.0),
    field!("0x15", SolarRadiation,     WattPerMeterSquared, 1.0, NONE, 0.0, 2000.0),
    field!("0x17", UvIndex,            UvIndex,   1.0, NONE, 0.0, 20.0),
    field!("0x0d", RainEvent,          Mm,        1.0, NONE, 0.0, 10_000.0),
    field!("0x0e", RainRate,           MmPerHour, 1.0, NONE, 0.0, 2_000.0),
    field!("0x10", RainDaily,          Mm,        1.0, NONE, 0.0, 10_000.0),
    field!("0x11", RainWeekly,         Mm,        1.0, NONE, 0.0, 20_000.0),
    field!("0x12", RainMonthly,        Mm,        1.0, NONE, 0.0, 50_000.0),
    field!("0x13", RainYearly,         Mm,        1.0, NONE, 0.0, 100_000.0),
    field!("0x14", RainTotal,          Mm,        1.0, NONE, 0.0, 1_000_000.0),
    // `wh25` indoor sensor block.
    field!("intemp", IndoorTemperature, Celsius,  1.0, NONE, -40.0, 80.0),
    field!("inhumi", IndoorHumidity,    Percent,  1.0, NONE, 0.0, 100.0),
    field!("abs",    PressureAbsolute,  Hpa,      1.0, NONE, 500.0, 1100.0),
    field!("rel",    PressureRelative,  Hpa,      1.0, NONE, 500.0, 1100.0),
    // Flat register-style keys: fixed-point integers with all-ones "no sensor" markers.
    field!("outtemp",       OutdoorTemperature, Celsius,        0.1, TENTHS_TEMP_NONE, -80.0, 80.0),
    field!("outhumi",       OutdoorHumidity,    Percent,        1.0, U8_NONE,  0.0, 100.0),
    field!("dewpoint",      Dewpoint,           Celsius,        0.1, TENTHS_TEMP_NONE, -80.0, 80.0),
    field!("windchill",     Windchill,          Celsius,        0.1, TENTHS_TEMP_NONE, -80.0, 80.0),
    field!("heatindex",     HeatIndex,          Celsius,        0.1, TENTHS_TEMP_NONE, -80.0, 100.0),
    field!("winddir",       WindDirection,      Degree,         1.0, U16_NONE, 0.0, 360.0),
    field!("windspeed",     WindSpeed,          MeterPerSecond, 0.1, U16_NONE, 0.0, 200.0),
    field!("gustspeed",     WindGust,           MeterPerSecond, 0.1, U16_NONE, 0.0, 200.0),
    field!("daywindmax",    MaxDailyGust,       MeterPerSecond, 0.1, U16_NONE, 0.0, 200.0),
    field!("solarradiation", SolarRadiation,    WattPerMeterSquared, 0.1, U32_NONE, 0.0, 2000.0),
    field!("uvi",           UvIndex,            UvIndex,        1.0, U8_NONE,  0.0, 20.0),
    field!("absbarometric", PressureAbsolute,   Hpa,            0.1, U16_NONE, 500.0, 1100.0),
    field!("relbarometric", PressureRelative,   Hpa,            0.1, U16_NONE, 500.0, 1100.0),
    field!("rainrate",      RainRate,           MmPerHour,      0.1, U16_NONE, 0.0, 2_000.0),
    field!("rainevent",     RainEvent,          Mm,             0.1, U16_NONE, 0.0, 10_000.0),
    field!("rainday",       RainDaily,          Mm,             0.1, U16_NONE, 0.0, 10_000.0),
    field!("rainweek",      RainWeekly,         Mm,             0.1, U16_NONE, 0.0, 20_000.0),
    field!("rainmonth",     RainMonthly,        Mm,             0.1, U32_NONE, 0.0, 50_000.0),
    field!("rainyear",      RainYearly,         Mm,             0.1, U32_NONE, 0.0, 100_000.0),
    field!("raintotals",    RainTotal,          Mm,             0.1, U32_NONE, 0.0, 1_000_000.0),
];

/// Lookup table keyed by lowercase field id.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTable {
    fields: HashMap<String, FieldSpec>,
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldTable {
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let fields = BUILTIN_FIELDS
            .iter()
            .map(|entry| {
                (
                    entry.id.to_string(),
                    FieldSpec {
                        quantity: entry.quantity,
                        unit: entry.unit,
                        scale: entry.scale,
                        sentinels: entry.sentinels.to_vec(),
                        min: entry.min,
                        max: entry.max,
                    },
                )
            })
            .collect();
        Self { fields }
    }

    /// Built-in table with the overrides file at `path` applied on top.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read field table {}", path.display()))?;
        let overrides: FieldTableOverrides = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse field table {}", path.display()))?;
        let mut table = Self::builtin();
        table
            .apply(overrides)
            .with_context(|| format!("invalid field table {}", path.display()))?;
        Ok(table)
    }

    pub fn insert(&mut self, id: &str, spec: FieldSpec) -> Result<()> {
        let key = normalize_id(id);
        spec.validate(&key)?;
        self.fields.insert(key, spec);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FieldSpec> {
        self.fields
            .get(id)
            .or_else(|| self.fields.get(&normalize_id(id)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn apply(&mut self, overrides: FieldTableOverrides) -> Result<()> {
        for id in &overrides.remove {
            self.fields.remove(&normalize_id(id));
        }
        for (id, patch) in overrides.fields {
            let key = normalize_id(&id);
            let spec = match self.fields.get(&key) {
                Some(existing) => patch.merge_into(existing.clone()),
                None => patch.into_new(&key)?,
            };
            self.insert(&key, spec)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTableOverrides {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldOverride>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldOverride {
    pub quantity: Option<Quantity>,
    pub unit: Option<Unit>,
    pub scale: Option<f64>,
    pub sentinels: Option<Vec<f64>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldOverride {
    fn merge_into(self, mut spec: FieldSpec) -> FieldSpec {
        if let Some(quantity) = self.quantity {
            spec.quantity = quantity;
        }
        if let Some(unit) = self.unit {
            spec.unit = unit;
        }
        if let Some(scale) = self.scale {
            spec.scale = scale;
        }
        if let Some(sentinels) = self.sentinels {
            spec.sentinels = sentinels;
        }
        if let Some(min) = self.min {
            spec.min = min;
        }
        if let Some(max) = self.max {
            spec.max = max;
        }
        spec
    }

    fn into_new(self, id: &str) -> Result<FieldSpec> {
        let (Some(quantity), Some(unit)) = (self.quantity, self.unit) else {
            bail!("new field '{id}' needs both quantity and unit");
        };
        Ok(FieldSpec {
            quantity,
            unit,
            scale: self.scale.unwrap_or(1.0),
            sentinels: self.sentinels.unwrap_or_default(),
            min: self.min.unwrap_or(f64::MIN),
            max: self.max.unwrap_or(f64::MAX),
        })
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
