//! Decoded geolocation records

use crate::fields::{Field, FieldMask};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded row
///
/// Fields that were not present in the database kind, or that were projected
/// out of the lookup, keep their zero value (empty string or `0.0`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Two-letter country code
    pub country: String,
    /// Region or state
    pub region: String,
    /// City
    pub city: String,
    /// Internet service provider
    pub isp: String,
    /// Latitude in degrees
    pub latitude: f32,
    /// Longitude in degrees
    pub longitude: f32,
    /// Domain name
    pub domain: String,
    /// Postal code
    pub zip_code: String,
    /// UTC offset
    pub time_zone: String,
    /// Connection speed class
    pub net_speed: String,
    /// International dialing code
    pub idd_code: String,
    /// Telephone area code
    pub area_code: String,
    /// Weather station code
    pub weather_station_code: String,
    /// Weather station name
    pub weather_station_name: String,
    /// Mobile country code
    pub mcc: String,
    /// Mobile network code
    pub mnc: String,
    /// Mobile carrier brand
    pub mobile_brand: String,
    /// Elevation in meters
    pub elevation: f32,
    /// Usage type class
    pub usage_type: String,
}

/// Borrowed view of a single field value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue<'a> {
    /// String column
    Str(&'a str),
    /// Float column
    Float(f32),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl Entry {
    fn string_mut(&mut self, field: Field) -> Option<&mut String> {
        let slot = match field {
            Field::Country => &mut self.country,
            Field::Region => &mut self.region,
            Field::City => &mut self.city,
            Field::Isp => &mut self.isp,
            Field::Domain => &mut self.domain,
            Field::ZipCode => &mut self.zip_code,
            Field::TimeZone => &mut self.time_zone,
            Field::NetSpeed => &mut self.net_speed,
            Field::IddCode => &mut self.idd_code,
            Field::AreaCode => &mut self.area_code,
            Field::WeatherStationCode => &mut self.weather_station_code,
            Field::WeatherStationName => &mut self.weather_station_name,
            Field::Mcc => &mut self.mcc,
            Field::Mnc => &mut self.mnc,
            Field::MobileBrand => &mut self.mobile_brand,
            Field::UsageType => &mut self.usage_type,
            Field::Latitude | Field::Longitude | Field::Elevation => return None,
        };
        Some(slot)
    }

    fn float_mut(&mut self, field: Field) -> Option<&mut f32> {
        match field {
            Field::Latitude => Some(&mut self.latitude),
            Field::Longitude => Some(&mut self.longitude),
            Field::Elevation => Some(&mut self.elevation),
            _ => None,
        }
    }

    /// Store a string column; ignored for float fields
    pub fn set_str(&mut self, field: Field, value: impl Into<String>) {
        if let Some(slot) = self.string_mut(field) {
            *slot = value.into();
        }
    }

    /// Store a float column; ignored for string fields
    pub fn set_float(&mut self, field: Field, value: f32) {
        if let Some(slot) = self.float_mut(field) {
            *slot = value;
        }
    }

    /// Read one column
    pub fn get(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Latitude => FieldValue::Float(self.latitude),
            Field::Longitude => FieldValue::Float(self.longitude),
            Field::Elevation => FieldValue::Float(self.elevation),
            Field::Country => FieldValue::Str(&self.country),
            Field::Region => FieldValue::Str(&self.region),
            Field::City => FieldValue::Str(&self.city),
            Field::Isp => FieldValue::Str(&self.isp),
            Field::Domain => FieldValue::Str(&self.domain),
            Field::ZipCode => FieldValue::Str(&self.zip_code),
            Field::TimeZone => FieldValue::Str(&self.time_zone),
            Field::NetSpeed => FieldValue::Str(&self.net_speed),
            Field::IddCode => FieldValue::Str(&self.idd_code),
            Field::AreaCode => FieldValue::Str(&self.area_code),
            Field::WeatherStationCode => FieldValue::Str(&self.weather_station_code),
            Field::WeatherStationName => FieldValue::Str(&self.weather_station_name),
            Field::Mcc => FieldValue::Str(&self.mcc),
            Field::Mnc => FieldValue::Str(&self.mnc),
            Field::MobileBrand => FieldValue::Str(&self.mobile_brand),
            Field::UsageType => FieldValue::Str(&self.usage_type),
        }
    }

    /// JSON object holding only the given columns, keyed by [`Field::key`]
    pub fn to_json(&self, fields: FieldMask) -> serde_json::Value {
        let map = fields
            .iter()
            .map(|f| {
                let value = match self.get(f) {
                    FieldValue::Str(s) => serde_json::Value::from(s),
                    FieldValue::Float(v) => serde_json::Value::from(v),
                };
                (f.key().to_string(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
