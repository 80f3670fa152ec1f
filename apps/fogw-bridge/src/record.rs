use crate::units::{Dimension, Unit, UnitSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic names a gateway reading can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    OutdoorTemperature,
    OutdoorHumidity,
    IndoorTemperature,
    IndoorHumidity,
    Dewpoint,
    Windchill,
    HeatIndex,
    FeelsLike,
    WindDirection,
    WindSpeed,
    WindGust,
    MaxDailyGust,
    SolarRadiation,
    UvIndex,
    PressureAbsolute,
    PressureRelative,
    RainRate,
    RainEvent,
    RainDaily,
    RainWeekly,
    RainMonthly,
    RainYearly,
    RainTotal,
    /// Rain fallen since the previous record, derived from the cumulative counters.
    Rain,
}

impl Quantity {
    pub fn dimension(self) -> Dimension {
        match self {
            Quantity::OutdoorTemperature
            | Quantity::IndoorTemperature
            | Quantity::Dewpoint
            | Quantity::Windchill
            | Quantity::HeatIndex
            | Quantity::FeelsLike => Dimension::Temperature,
            Quantity::OutdoorHumidity | Quantity::IndoorHumidity => Dimension::Humidity,
            Quantity::WindDirection => Dimension::Direction,
            Quantity::WindSpeed | Quantity::WindGust | Quantity::MaxDailyGust => Dimension::Speed,
            Quantity::SolarRadiation => Dimension::Irradiance,
            Quantity::UvIndex => Dimension::UvIndex,
            Quantity::PressureAbsolute | Quantity::PressureRelative => Dimension::Pressure,
            Quantity::RainRate => Dimension::RainRate,
            Quantity::RainEvent
            | Quantity::RainDaily
            | Quantity::RainWeekly
            | Quantity::RainMonthly
            | Quantity::RainYearly
            | Quantity::RainTotal
            | Quantity::Rain => Dimension::RainDepth,
        }
    }

    pub fn canonical_unit(self, system: UnitSystem) -> Unit {
        system.canonical_unit(self.dimension())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quantity::OutdoorTemperature => "outdoor_temperature",
            Quantity::OutdoorHumidity => "outdoor_humidity",
            Quantity::IndoorTemperature => "indoor_temperature",
            Quantity::IndoorHumidity => "indoor_humidity",
            Quantity::Dewpoint => "dewpoint",
            Quantity::Windchill => "windchill",
            Quantity::HeatIndex => "heat_index",
            Quantity::FeelsLike => "feels_like",
            Quantity::WindDirection => "wind_direction",
            Quantity::WindSpeed => "wind_speed",
            Quantity::WindGust => "wind_gust",
            Quantity::MaxDailyGust => "max_daily_gust",
            Quantity::SolarRadiation => "solar_radiation",
            Quantity::UvIndex => "uv_index",
            Quantity::PressureAbsolute => "pressure_absolute",
            Quantity::PressureRelative => "pressure_relative",
            Quantity::RainRate => "rain_rate",
            Quantity::RainEvent => "rain_event",
            Quantity::RainDaily => "rain_daily",
            Quantity::RainWeekly => "rain_weekly",
            Quantity::RainMonthly => "rain_monthly",
            Quantity::RainYearly => "rain_yearly",
            Quantity::RainTotal => "rain_total",
            Quantity::Rain => "rain",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    pub quantity: Quantity,
    pub value: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingValue {
    pub value: f64,
    pub unit: Unit,
}

/// Output of one successful poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub unit_system: UnitSystem,
    pub readings: BTreeMap<Quantity, ReadingValue>,
}

impl MeasurementRecord {
    pub fn new(timestamp: i64, unit_system: UnitSystem) -> Self {
        Self {
            timestamp,
            unit_system,
            readings: BTreeMap::new(),
        }
    }

    /// Adds a reading unless the quantity is already present. Returns whether it was stored.
    pub fn insert(&mut self, reading: CanonicalReading) -> bool {
        if self.readings.contains_key(&reading.quantity) {
            return false;
        }
        self.readings.insert(
            reading.quantity,
            ReadingValue {
                value: reading.value,
                unit: reading.unit,
            },
        );
        true
    }

    pub fn get(&self, quantity: Quantity) -> Option<ReadingValue> {
        self.readings.get(&quantity).copied()
    }

    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        self.get(quantity).map(|reading| reading.value)
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn readings(&self) -> impl Iterator<Item = CanonicalReading> + '_ {
        self.readings
            .iter()
            .map(|(quantity, reading)| CanonicalReading {
                quantity: *quantity,
                value: reading.value,
                unit: reading.unit,
            })
    }
}
