//! Upstream earthquake report payload.
//!
//! Field names follow the upstream document exactly, so the structs can be
//! stored back as JSON without loss.

use serde::{Deserialize, Serialize};

/// Root of the latest-earthquake document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoGempaResponse {
    #[serde(rename = "Infogempa")]
    pub infogempa: InfoGempa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoGempa {
    pub gempa: Gempa,
}

/// A single earthquake report as published upstream.
///
/// Every value is a string in the source document, including the numeric
/// ones; normalisation happens in `quakewatch-core`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Gempa {
    /// Local calendar date, e.g. `"17 Okt 2026"`.
    pub tanggal: String,
    /// Local wall-clock time, e.g. `"10:11:12 WIB"`.
    pub jam: String,
    /// RFC 3339 instant of the event.
    pub date_time: String,
    /// Signed `"lat,lon"` pair.
    pub coordinates: String,
    /// Latitude with hemisphere suffix, e.g. `"6.77 LS"`.
    pub lintang: String,
    /// Longitude with hemisphere suffix, e.g. `"105.51 BT"`.
    pub bujur: String,
    pub magnitude: String,
    /// Depth with unit, e.g. `"10 km"`.
    pub kedalaman: String,
    pub wilayah: String,
    pub potensi: String,
    pub dirasakan: String,
    pub shakemap: String,
}
