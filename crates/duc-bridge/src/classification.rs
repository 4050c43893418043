//! Sensor classification
//!
//! Every catalogued point is either an [`SensorClassification::Alarm`]
//! (binary condition) or a [`SensorClassification::Measurement`] (numeric
//! quantity). The variant decides the display name, unit, value
//! formatting and the publish category.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Publish channel a classification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Alarms, published as on/off states
    BinarySensor,
    /// Numeric measurements
    Sensor,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BinarySensor => "binary_sensor",
            Self::Sensor => "sensor",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical quantity of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Current,
    Voltage,
    Power,
    Energy,
}

impl Quantity {
    /// Map a controller unit code to its quantity.
    ///
    /// Returns `None` for unit codes without a mapping.
    pub fn from_unit(attr: &str) -> Option<Self> {
        match attr {
            "A" => Some(Self::Current),
            "V" => Some(Self::Voltage),
            "W" => Some(Self::Power),
            "kWh" => Some(Self::Energy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Voltage => "voltage",
            Self::Power => "power",
            Self::Energy => "energy",
        }
    }

    /// Energy meters count up; everything else is a snapshot
    pub fn accumulation(&self) -> Accumulation {
        match self {
            Self::Energy => Accumulation::CumulativeTotal,
            _ => Accumulation::Instantaneous,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a measurement is a snapshot or a running total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    Instantaneous,
    CumulativeTotal,
}

impl Accumulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instantaneous => "instantaneous",
            Self::CumulativeTotal => "cumulative_total",
        }
    }

    /// State class announced to the bus
    pub fn state_class(&self) -> &'static str {
        match self {
            Self::Instantaneous => "measurement",
            Self::CumulativeTotal => "total",
        }
    }
}

/// How one point is presented downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorClassification {
    /// Binary condition, active while the raw value is above zero
    Alarm { name: String },
    /// Numeric reading of a physical quantity
    Measurement {
        name: String,
        quantity: Quantity,
        accumulation: Accumulation,
        unit: String,
    },
}

impl SensorClassification {
    pub fn alarm(name: impl Into<String>) -> Self {
        Self::Alarm { name: name.into() }
    }

    /// Classify a numeric point by its unit code; `None` if the unit is unmapped.
    pub fn measurement(name: impl Into<String>, unit: &str) -> Option<Self> {
        let quantity = Quantity::from_unit(unit)?;
        Some(Self::Measurement {
            name: name.into(),
            quantity,
            accumulation: quantity.accumulation(),
            unit: unit.to_string(),
        })
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Self::Alarm { name } | Self::Measurement { name, .. } => name,
        }
    }

    /// Unit of measurement, if the reading has one
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Alarm { .. } => None,
            Self::Measurement { unit, .. } => Some(unit),
        }
    }

    /// Render a raw controller value for publishing
    pub fn format(&self, value: f64) -> String {
        match self {
            Self::Alarm { .. } => {
                if value > 0.0 {
                    "ON".to_string()
                } else {
                    "OFF".to_string()
                }
            }
            Self::Measurement { .. } => value.to_string(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Alarm { .. } => Category::BinarySensor,
            Self::Measurement { .. } => Category::Sensor,
        }
    }

    /// Device class announced by the discovery message
    pub fn device_class(&self) -> &'static str {
        match self {
            Self::Alarm { .. } => "problem",
            Self::Measurement { quantity, .. } => quantity.as_str(),
        }
    }

    pub fn state_class(&self) -> &'static str {
        match self {
            Self::Alarm { .. } => "measurement",
            Self::Measurement { accumulation, .. } => accumulation.state_class(),
        }
    }
}
