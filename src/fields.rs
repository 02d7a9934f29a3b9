//! Field definitions and the schema catalog
//!
//! A database file declares its *kind* in the first header byte. The kind
//! selects which of the 19 possible fields are present in every row and in
//! which order their 4-byte slots appear. The catalog below is the single
//! source of truth for that mapping.
//!
//! Callers may request a subset of a kind's fields (a *projection*). The
//! resolved [`Projection`] keeps every slot of the schema so that rows stay
//! aligned, but marks the slots nobody asked for as skipped.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One column of a geolocation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Field {
    /// Two-letter country code
    Country = 0,
    /// Region or state name
    Region,
    /// City name
    City,
    /// Internet service provider
    Isp,
    /// Latitude in degrees (float slot)
    Latitude,
    /// Longitude in degrees (float slot)
    Longitude,
    /// Domain name
    Domain,
    /// Postal code
    ZipCode,
    /// UTC offset, e.g. "-07:00"
    TimeZone,
    /// Connection speed class
    NetSpeed,
    /// International direct dialing code
    IddCode,
    /// Telephone area code
    AreaCode,
    /// Weather station code
    WeatherStationCode,
    /// Weather station name
    WeatherStationName,
    /// Mobile country code
    Mcc,
    /// Mobile network code
    Mnc,
    /// Mobile carrier brand
    MobileBrand,
    /// Elevation in meters (float slot)
    Elevation,
    /// Usage type class
    UsageType,
}

impl Field {
    /// All fields in declaration order
    pub const ALL: [Field; 19] = [
        Field::Country,
        Field::Region,
        Field::City,
        Field::Isp,
        Field::Latitude,
        Field::Longitude,
        Field::Domain,
        Field::ZipCode,
        Field::TimeZone,
        Field::NetSpeed,
        Field::IddCode,
        Field::AreaCode,
        Field::WeatherStationCode,
        Field::WeatherStationName,
        Field::Mcc,
        Field::Mnc,
        Field::MobileBrand,
        Field::Elevation,
        Field::UsageType,
    ];

    /// Human readable name
    pub const fn name(self) -> &'static str {
        match self {
            Field::Country => "Country",
            Field::Region => "Region",
            Field::City => "City",
            Field::Isp => "ISP",
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::Domain => "Domain",
            Field::ZipCode => "ZipCode",
            Field::TimeZone => "TimeZone",
            Field::NetSpeed => "NetSpeed",
            Field::IddCode => "IDDCode",
            Field::AreaCode => "AreaCode",
            Field::WeatherStationCode => "WeatherStationCode",
            Field::WeatherStationName => "WeatherStationName",
            Field::Mcc => "MCC",
            Field::Mnc => "MNC",
            Field::MobileBrand => "MobileBrand",
            Field::Elevation => "Elevation",
            Field::UsageType => "UsageType",
        }
    }

    /// Column key used in JSON and CSV output
    pub const fn key(self) -> &'static str {
        match self {
            Field::Country => "country",
            Field::Region => "region",
            Field::City => "city",
            Field::Isp => "isp",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Domain => "domain",
            Field::ZipCode => "zip_code",
            Field::TimeZone => "time_zone",
            Field::NetSpeed => "net_speed",
            Field::IddCode => "idd_code",
            Field::AreaCode => "area_code",
            Field::WeatherStationCode => "weather_station_code",
            Field::WeatherStationName => "weather_station_name",
            Field::Mcc => "mcc",
            Field::Mnc => "mnc",
            Field::MobileBrand => "mobile_brand",
            Field::Elevation => "elevation",
            Field::UsageType => "usage_type",
        }
    }

    /// True for slots holding an IEEE-754 float instead of a string pointer
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Field::Latitude | Field::Longitude | Field::Elevation)
    }

    #[inline]
    const fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown field name: {0}")]
pub struct ParseFieldError(pub String);

impl FromStr for Field {
    type Err = ParseFieldError;

    /// Accepts display names and column keys, case-insensitively
    /// ("ISP", "isp", "zip_code", "ZipCode", "weathercode").
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let alias = match wanted.as_str() {
            "weathercode" => Some(Field::WeatherStationCode),
            "weathername" => Some(Field::WeatherStationName),
            "lat" => Some(Field::Latitude),
            "lon" | "lng" => Some(Field::Longitude),
            _ => None,
        };
        if let Some(field) = alias {
            return Ok(field);
        }
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ParseFieldError(s.to_string()))
    }
}

/// Set of fields, one bit per [`Field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldMask(u32);

impl FieldMask {
    /// The empty set
    pub const EMPTY: FieldMask = FieldMask(0);

    /// Every field
    pub const ALL: FieldMask = FieldMask((1 << Field::ALL.len()) - 1);

    /// Set containing exactly the given fields
    pub fn from_fields(fields: &[Field]) -> Self {
        fields.iter().fold(Self::EMPTY, |m, f| m.with(*f))
    }

    /// Copy of this set with `field` added
    #[inline]
    pub const fn with(self, field: Field) -> Self {
        FieldMask(self.0 | field.bit())
    }

    /// Membership test
    #[inline]
    pub const fn contains(self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    /// True if no field is set
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of fields in the set
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Fields in declaration order
    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Field> for FieldMask {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |m, f| m.with(f))
    }
}

use Field::*;

static SCHEMAS: [&[Field]; 24] = [
    // 1
    &[Country],
    // 2
    &[Country, Isp],
    // 3
    &[Country, Region, City],
    // 4
    &[Country, Region, City, Isp],
    // 5
    &[Country, Region, City, Latitude, Longitude],
    // 6
    &[Country, Region, City, Latitude, Longitude, Isp],
    // 7
    &[Country, Region, City, Isp, Domain],
    // 8
    &[Country, Region, City, Latitude, Longitude, Isp, Domain],
    // 9
    &[Country, Region, City, Latitude, Longitude, ZipCode],
    // 10
    &[Country, Region, City, Latitude, Longitude, ZipCode, Isp, Domain],
    // 11
    &[Country, Region, City, Latitude, Longitude, ZipCode, TimeZone],
    // 12
    &[
        Country, Region, City, Latitude, Longitude, ZipCode, TimeZone, Isp, Domain,
    ],
    // 13
    &[
        Country, Region, City, Latitude, Longitude, TimeZone, NetSpeed,
    ],
    // 14
    &[
        Country, Region, City, Latitude, Longitude, ZipCode, TimeZone, Isp, Domain, NetSpeed,
    ],
    // 15
    &[
        Country, Region, City, Latitude, Longitude, ZipCode, TimeZone, IddCode, AreaCode,
    ],
    // 16
    &[
        Country, Region, City, Latitude, Longitude, ZipCode, TimeZone, Isp, Domain, NetSpeed,
        IddCode, AreaCode,
    ],
    // 17
    &[
        Country,
        Region,
        City,
        Latitude,
        Longitude,
        TimeZone,
        NetSpeed,
        WeatherStationCode,
        WeatherStationName,
    ],
    // 18
    &[
        Country,
        Region,
        City,
        Latitude,
        Longitude,
        ZipCode,
        TimeZone,
        Isp,
        Domain,
        NetSpeed,
        IddCode,
        AreaCode,
        WeatherStationCode,
        WeatherStationName,
    ],
    // 19
    &[
        Country, Region, City, Latitude, Longitude, Isp, Domain, IddCode, Mcc, Mnc, MobileBrand,
    ],
    // 20
    &[
        Country,
        Region,
        City,
        Latitude,
        Longitude,
        ZipCode,
        TimeZone,
        Isp,
        Domain,
        NetSpeed,
        IddCode,
        AreaCode,
        WeatherStationCode,
        WeatherStationName,
        Mcc,
        Mnc,
        MobileBrand,
    ],
    // 21
    &[
        Country, Region, City, Latitude, Longitude, ZipCode, TimeZone, AreaCode, Elevation,
    ],
    // 22
    &[
        Country,
        Region,
        City,
        Latitude,
        Longitude,
        ZipCode,
        TimeZone,
        Isp,
        Domain,
        NetSpeed,
        IddCode,
        AreaCode,
        WeatherStationCode,
        WeatherStationName,
        Mcc,
        Mnc,
        MobileBrand,
        Elevation,
    ],
    // 23
    &[
        Country, Region, City, Latitude, Longitude, Isp, Domain, Mcc, Mnc, MobileBrand, UsageType,
    ],
    // 24
    &[
        Country,
        Region,
        City,
        Latitude,
        Longitude,
        ZipCode,
        TimeZone,
        Isp,
        Domain,
        NetSpeed,
        IddCode,
        AreaCode,
        WeatherStationCode,
        WeatherStationName,
        Mcc,
        Mnc,
        MobileBrand,
        Elevation,
        UsageType,
    ],
];

/// Database kind: selects the schema of every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryKind(u8);

impl EntryKind {
    /// Validate a raw kind id; `None` if the catalog does not know it
    pub fn new(id: u8) -> Option<Self> {
        (1..=SCHEMAS.len() as u8).contains(&id).then_some(EntryKind(id))
    }

    /// Raw kind id (1..=24)
    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Ordered field list of this kind
    #[inline]
    pub fn schema(self) -> &'static [Field] {
        SCHEMAS[self.0 as usize - 1]
    }

    /// Number of 4-byte slots per row
    #[inline]
    pub fn field_count(self) -> usize {
        self.schema().len()
    }

    /// True if the kind carries `field`
    pub fn has_field(self, field: Field) -> bool {
        self.schema().contains(&field)
    }

    /// Resolve a requested projection against this kind
    ///
    /// An empty request selects the whole schema. Otherwise every requested
    /// field must exist in the schema.
    pub fn resolve(self, requested: &[Field]) -> Result<Projection> {
        if let Some(&missing) = requested.iter().find(|f| !self.has_field(**f)) {
            return Err(GeoError::UnsupportedField {
                field: missing,
                kind: self.0,
            });
        }
        let wanted = if requested.is_empty() {
            FieldMask::ALL
        } else {
            FieldMask::from_fields(requested)
        };
        let slots: Box<[Option<Field>]> = self
            .schema()
            .iter()
            .map(|f| wanted.contains(*f).then_some(*f))
            .collect();
        let mask = slots.iter().flatten().copied().collect();
        Ok(Projection { slots, mask })
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DB{}", self.0)
    }
}

/// Per-slot decode plan for one kind
///
/// `slots[n]` is `Some(field)` when schema slot `n` should be decoded and
/// `None` when it is projected out. The slot count always equals the kind's
/// field count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    slots: Box<[Option<Field>]>,
    mask: FieldMask,
}

impl Projection {
    /// Decode plan, one entry per row slot
    #[inline]
    pub fn slots(&self) -> &[Option<Field>] {
        &self.slots
    }

    /// Fields that will be decoded
    #[inline]
    pub fn mask(&self) -> FieldMask {
        self.mask
    }

    /// Fields that will be decoded, in schema order
    pub fn fields(&self) -> Vec<Field> {
        self.slots.iter().flatten().copied().collect()
    }

    /// True if no slot is skipped
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}
