use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical dimension of a measurement. Conversions only happen inside one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Temperature,
    Humidity,
    Speed,
    Direction,
    RainDepth,
    RainRate,
    Pressure,
    Irradiance,
    UvIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Celsius,
    Fahrenheit,
    Percent,
    KmPerHour,
    MeterPerSecond,
    MilePerHour,
    Knot,
    Degree,
    Mm,
    Cm,
    Inch,
    MmPerHour,
    CmPerHour,
    InchPerHour,
    Hpa,
    Kpa,
    InchHg,
    MmHg,
    WattPerMeterSquared,
    Lux,
    Klux,
    UvIndex,
}

// Outdoor illuminance to irradiance, the usual daylight-spectrum approximation.
const LUX_PER_WATT_M2: f64 = 126.7;

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Celsius | Unit::Fahrenheit => Dimension::Temperature,
            Unit::Percent => Dimension::Humidity,
            Unit::KmPerHour | Unit::MeterPerSecond | Unit::MilePerHour | Unit::Knot => {
                Dimension::Speed
            }
            Unit::Degree => Dimension::Direction,
            Unit::Mm | Unit::Cm | Unit::Inch => Dimension::RainDepth,
            Unit::MmPerHour | Unit::CmPerHour | Unit::InchPerHour => Dimension::RainRate,
            Unit::Hpa | Unit::Kpa | Unit::InchHg | Unit::MmHg => Dimension::Pressure,
            Unit::WattPerMeterSquared | Unit::Lux | Unit::Klux => Dimension::Irradiance,
            Unit::UvIndex => Dimension::UvIndex,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Celsius => "celsius",
            Unit::Fahrenheit => "fahrenheit",
            Unit::Percent => "percent",
            Unit::KmPerHour => "km_per_hour",
            Unit::MeterPerSecond => "meter_per_second",
            Unit::MilePerHour => "mile_per_hour",
            Unit::Knot => "knot",
            Unit::Degree => "degree",
            Unit::Mm => "mm",
            Unit::Cm => "cm",
            Unit::Inch => "inch",
            Unit::MmPerHour => "mm_per_hour",
            Unit::CmPerHour => "cm_per_hour",
            Unit::InchPerHour => "inch_per_hour",
            Unit::Hpa => "hpa",
            Unit::Kpa => "kpa",
            Unit::InchHg => "inch_hg",
            Unit::MmHg => "mm_hg",
            Unit::WattPerMeterSquared => "watt_per_meter_squared",
            Unit::Lux => "lux",
            Unit::Klux => "klux",
            Unit::UvIndex => "uv_index",
        }
    }

    /// Interprets the unit token a gateway prints next to a value (`"km/h"`, `"hPa"`, `"C"`).
    pub fn from_hint(hint: &str) -> Option<Unit> {
        let token = hint.trim().to_ascii_lowercase();
        let unit = match token.trim_start_matches('°') {
            "c" | "degc" => Unit::Celsius,
            "f" | "degf" => Unit::Fahrenheit,
            "℃" => Unit::Celsius,
            "℉" => Unit::Fahrenheit,
            "%" => Unit::Percent,
            "km/h" | "kmh" | "kph" => Unit::KmPerHour,
            "m/s" => Unit::MeterPerSecond,
            "mph" => Unit::MilePerHour,
            "knots" | "knot" | "kn" => Unit::Knot,
            "deg" => Unit::Degree,
            "mm" => Unit::Mm,
            "cm" => Unit::Cm,
            "in" | "inch" => Unit::Inch,
            "mm/hr" | "mm/h" => Unit::MmPerHour,
            "cm/hr" | "cm/h" => Unit::CmPerHour,
            "in/hr" | "in/h" => Unit::InchPerHour,
            "hpa" | "mbar" => Unit::Hpa,
            "kpa" => Unit::Kpa,
            "inhg" => Unit::InchHg,
            "mmhg" => Unit::MmHg,
            "w/m2" | "w/m²" => Unit::WattPerMeterSquared,
            "lux" | "lx" => Unit::Lux,
            "klux" | "klx" => Unit::Klux,
            _ => return None,
        };
        Some(unit)
    }

    fn to_base(self, value: f64) -> f64 {
        match self {
            Unit::Fahrenheit => (value - 32.0) * (5.0 / 9.0),
            Unit::KmPerHour => value / 3.6,
            Unit::MilePerHour => value * 0.447_04,
            Unit::Knot => value * 0.514_444,
            Unit::Cm | Unit::CmPerHour => value * 10.0,
            Unit::Inch | Unit::InchPerHour => value * 25.4,
            Unit::Kpa => value * 10.0,
            Unit::InchHg => value * 33.863_886,
            Unit::MmHg => value * 1.333_224,
            Unit::Lux => value / LUX_PER_WATT_M2,
            Unit::Klux => value * 1000.0 / LUX_PER_WATT_M2,
            _ => value,
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Unit::Fahrenheit => value * (9.0 / 5.0) + 32.0,
            Unit::KmPerHour => value * 3.6,
            Unit::MilePerHour => value / 0.447_04,
            Unit::Knot => value / 0.514_444,
            Unit::Cm | Unit::CmPerHour => value / 10.0,
            Unit::Inch | Unit::InchPerHour => value / 25.4,
            Unit::Kpa => value / 10.0,
            Unit::InchHg => value / 33.863_886,
            Unit::MmHg => value / 1.333_224,
            Unit::Lux => value * LUX_PER_WATT_M2,
            Unit::Klux => value * LUX_PER_WATT_M2 / 1000.0,
            _ => value,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts `value` from one unit to another. Returns `None` across dimensions.
pub fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    if from.dimension() != to.dimension() {
        return None;
    }
    if from == to {
        return Some(value);
    }
    Some(to.from_base(from.to_base(value)))
}

/// Target unit system for emitted readings, named after the host's unit groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    #[default]
    MetricWx,
    Us,
}

impl UnitSystem {
    pub fn canonical_unit(self, dimension: Dimension) -> Unit {
        match (dimension, self) {
            (Dimension::Temperature, UnitSystem::Us) => Unit::Fahrenheit,
            (Dimension::Temperature, _) => Unit::Celsius,
            (Dimension::Humidity, _) => Unit::Percent,
            (Dimension::Speed, UnitSystem::Metric) => Unit::KmPerHour,
            (Dimension::Speed, UnitSystem::MetricWx) => Unit::MeterPerSecond,
            (Dimension::Speed, UnitSystem::Us) => Unit::MilePerHour,
            (Dimension::Direction, _) => Unit::Degree,
            (Dimension::RainDepth, UnitSystem::Metric) => Unit::Cm,
            (Dimension::RainDepth, UnitSystem::MetricWx) => Unit::Mm,
            (Dimension::RainDepth, UnitSystem::Us) => Unit::Inch,
            (Dimension::RainRate, UnitSystem::Metric) => Unit::CmPerHour,
            (Dimension::RainRate, UnitSystem::MetricWx) => Unit::MmPerHour,
            (Dimension::RainRate, UnitSystem::Us) => Unit::InchPerHour,
            (Dimension::Pressure, UnitSystem::Us) => Unit::InchHg,
            (Dimension::Pressure, _) => Unit::Hpa,
            (Dimension::Irradiance, _) => Unit::WattPerMeterSquared,
            (Dimension::UvIndex, _) => Unit::UvIndex,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::MetricWx => "metricwx",
            UnitSystem::Us => "us",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "metricwx" | "metric_wx" => Ok(UnitSystem::MetricWx),
            "us" | "imperial" => Ok(UnitSystem::Us),
            other => Err(format!(
                "unknown unit system '{other}' (expected metric, metricwx or us)"
            )),
        }
    }
}
