//! Writer for small BIN databases used by the integration tests and benches
//!
//! Lays files out the way real databases are: 21-byte header, IPv4 rows,
//! IPv6 rows, then a deduplicated string pool. Row prefixes are written
//! least-significant byte first and row table offsets are 1-based.

#![allow(dead_code)]

use ip2geo::{EntryKind, Field};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

const HEADER_LEN: usize = 21;

/// Builder for an in-memory BIN file
#[derive(Debug, Clone)]
pub struct BinWriter {
    kind: EntryKind,
    date: (u8, u8, u8),
    v4: Vec<(Ipv4Addr, Vec<String>)>,
    v6: Vec<(Ipv6Addr, Vec<String>)>,
}

impl BinWriter {
    pub fn new(kind: u8) -> Self {
        Self {
            kind: EntryKind::new(kind).expect("valid kind"),
            date: (24, 6, 1),
            v4: Vec::new(),
            v6: Vec::new(),
        }
    }

    pub fn date(mut self, year: u8, month: u8, day: u8) -> Self {
        self.date = (year, month, day);
        self
    }

    /// Add an IPv4 row starting at `start`; one value per schema field,
    /// numeric fields given as decimal text
    pub fn v4(mut self, start: &str, values: &[&str]) -> Self {
        let addr = start.parse().expect("ipv4 address");
        let values = self.values(values);
        self.v4.push((addr, values));
        self
    }

    pub fn v6(mut self, start: &str, values: &[&str]) -> Self {
        let addr = start.parse().expect("ipv6 address");
        let values = self.values(values);
        self.v6.push((addr, values));
        self
    }

    /// Closing IPv4 row with blank values
    pub fn v4_end(self, start: &str) -> Self {
        let blank = self.blank();
        let refs: Vec<&str> = blank.iter().map(String::as_str).collect();
        self.v4(start, &refs)
    }

    pub fn v6_end(self, start: &str) -> Self {
        let blank = self.blank();
        let refs: Vec<&str> = blank.iter().map(String::as_str).collect();
        self.v6(start, &refs)
    }

    fn blank(&self) -> Vec<String> {
        self.kind
            .schema()
            .iter()
            .map(|f| if f.is_numeric() { "0" } else { "-" }.to_string())
            .collect()
    }

    fn values(&self, values: &[&str]) -> Vec<String> {
        assert_eq!(
            values.len(),
            self.kind.field_count(),
            "{} rows carry {} values",
            self.kind,
            self.kind.field_count()
        );
        values.iter().map(|v| v.to_string()).collect()
    }

    pub fn build(&self) -> Vec<u8> {
        let schema = self.kind.schema();
        let v4_stride = 4 + 4 * schema.len();
        let v6_stride = 16 + 4 * schema.len();
        let v4_at = HEADER_LEN;
        let v6_at = v4_at + self.v4.len() * v4_stride;
        let pool_at = v6_at + self.v6.len() * v6_stride;

        let mut pool = Vec::new();
        let mut interned: HashMap<String, u32> = HashMap::new();
        let mut slot = |field: &Field, value: &str| -> u32 {
            if field.is_numeric() {
                return value.parse::<f32>().expect("numeric value").to_bits();
            }
            *interned.entry(value.to_string()).or_insert_with(|| {
                let at = (pool_at + pool.len()) as u32;
                pool.push(value.len() as u8);
                pool.extend_from_slice(value.as_bytes());
                at
            })
        };

        let mut rows = Vec::new();
        for (addr, values) in &self.v4 {
            rows.extend(addr.octets().iter().rev());
            for (field, value) in schema.iter().zip(values) {
                rows.extend_from_slice(&slot(field, value.as_str()).to_le_bytes());
            }
        }
        for (addr, values) in &self.v6 {
            rows.extend(addr.octets().iter().rev());
            for (field, value) in schema.iter().zip(values) {
                rows.extend_from_slice(&slot(field, value.as_str()).to_le_bytes());
            }
        }

        let table = |count: usize, at: usize| -> [u32; 2] {
            if count == 0 {
                [0, 0]
            } else {
                [count as u32, at as u32 + 1]
            }
        };

        let mut file = vec![
            self.kind.id(),
            schema.len() as u8 + 1,
            self.date.0,
            self.date.1,
            self.date.2,
        ];
        for word in table(self.v4.len(), v4_at)
            .into_iter()
            .chain(table(self.v6.len(), v6_at))
        {
            file.extend_from_slice(&word.to_le_bytes());
        }
        file.extend(rows);
        file.extend(pool);
        file
    }
}

/// DB5 (country, region, city, latitude, longitude) with a few real-looking
/// ranges in both families
pub fn sample_db5() -> Vec<u8> {
    BinWriter::new(5)
        .v4("0.0.0.0", &["-", "-", "-", "0", "0"])
        .v4("1.0.0.0", &["AU", "Queensland", "Brisbane", "-27.46794", "153.02809"])
        .v4("8.8.8.0", &["US", "California", "Mountain View", "37.40599", "-122.078514"])
        .v4("8.8.9.0", &["US", "California", "Los Angeles", "34.05223", "-118.24368"])
        .v4("203.0.113.0", &["JP", "Tokyo", "Tokyo", "35.6895", "139.69171"])
        .v4_end("255.255.255.255")
        .v6("::", &["-", "-", "-", "0", "0"])
        .v6("2001:4860::", &["US", "California", "Mountain View", "37.40599", "-122.078514"])
        .v6("2001:4861::", &["-", "-", "-", "0", "0"])
        .v6("2a00:1450::", &["IE", "Dublin", "Dublin", "53.34399", "-6.26719"])
        .v6("2a00:1451::", &["-", "-", "-", "0", "0"])
        .v6_end("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff")
        .build()
}

/// DB1 where every IPv4 row's country names its row, for range tests
pub fn numbered_db1(bounds: &[u32]) -> Vec<u8> {
    let mut w = BinWriter::new(1);
    for (i, b) in bounds.iter().enumerate() {
        let name = format!("R{}", i);
        w = w.v4(&Ipv4Addr::from(*b).to_string(), &[name.as_str()]);
    }
    w.build()
}
