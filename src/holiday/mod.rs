//! Read-only holiday catalog, keyed by country.
//!
//! Each country maps holiday names to a bounded, ordered list of concrete dates
//! that are already adjusted for weekend observance. The catalog is assembled
//! once at startup (built-in rules plus any `holidays-<CC>.toml` files) and is
//! never mutated afterwards; alarm preferences refer to entries by name.
//!
//! ## Catalog file format
//!
//! ```toml
//! country = "CA"                     # optional, defaults to the file name code
//!
//! [[holiday]]
//! name = "Canada Day"
//! dates = ["2026-07-01", "2027-07-01"]
//! ```
//!
//! Malformed dates are dropped with a warning rather than rejecting the file.

pub mod rules;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::constants::{DATE_FORMAT, HOLIDAY_FILE_PREFIX};
use crate::logger::Log;

macro_rules! countries {
    ($($variant:ident => ($code:literal, $name:literal)),+ $(,)?) => {
        /// Countries with holiday support.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Country {
            $($variant),+
        }

        impl Country {
            pub const ALL: &'static [Country] = &[$(Country::$variant),+];

            /// ISO 3166-1 alpha-2 code.
            pub fn code(self) -> &'static str {
                match self {
                    $(Country::$variant => $code),+
                }
            }

            /// Display name.
            pub fn friendly_name(self) -> &'static str {
                match self {
                    $(Country::$variant => $name),+
                }
            }

            /// Look up a country by its code, case-insensitively.
            pub fn from_code(code: &str) -> Option<Country> {
                match code.trim().to_ascii_uppercase().as_str() {
                    $($code => Some(Country::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

countries! {
    Argentina => ("AR", "Argentina"),
    Aruba => ("AW", "Aruba"),
    Australia => ("AU", "Australia"),
    Austria => ("AT", "Austria"),
    Belarus => ("BY", "Belarus"),
    Belgium => ("BE", "Belgium"),
    Brazil => ("BR", "Brazil"),
    Bulgaria => ("BG", "Bulgaria"),
    Canada => ("CA", "Canada"),
    Colombia => ("CO", "Colombia"),
    Croatia => ("HR", "Croatia"),
    Czechia => ("CZ", "Czechia"),
    Denmark => ("DK", "Denmark"),
    DominicanRepublic => ("DO", "Dominican Republic"),
    Egypt => ("EG", "Egypt"),
    Estonia => ("EE", "Estonia"),
    Finland => ("FI", "Finland"),
    France => ("FR", "France"),
    Germany => ("DE", "Germany"),
    Hungary => ("HU", "Hungary"),
    Iceland => ("IS", "Iceland"),
    India => ("IN", "India"),
    Ireland => ("IE", "Ireland"),
    Israel => ("IL", "Israel"),
    Italy => ("IT", "Italy"),
    Japan => ("JP", "Japan"),
    Kenya => ("KE", "Kenya"),
    Korea => ("KR", "Korea"),
    Lithuania => ("LT", "Lithuania"),
    Luxembourg => ("LU", "Luxembourg"),
    Mexico => ("MX", "Mexico"),
    Morocco => ("MA", "Morocco"),
    Netherlands => ("NL", "Netherlands"),
    NewZealand => ("NZ", "New Zealand"),
    Nicaragua => ("NI", "Nicaragua"),
    Nigeria => ("NG", "Nigeria"),
    Norway => ("NO", "Norway"),
    Paraguay => ("PY", "Paraguay"),
    Peru => ("PE", "Peru"),
    Poland => ("PL", "Poland"),
    Portugal => ("PT", "Portugal"),
    Russia => ("RU", "Russia"),
    Serbia => ("RS", "Serbia"),
    Singapore => ("SG", "Singapore"),
    Slovakia => ("SK", "Slovakia"),
    Slovenia => ("SI", "Slovenia"),
    SouthAfrica => ("ZA", "South Africa"),
    Spain => ("ES", "Spain"),
    Sweden => ("SE", "Sweden"),
    Switzerland => ("CH", "Switzerland"),
    Turkey => ("TR", "Turkey"),
    Ukraine => ("UA", "Ukraine"),
    UnitedKingdom => ("GB", "United Kingdom"),
    UnitedStates => ("US", "United States"),
    Vietnam => ("VN", "Vietnam"),
}

impl Country {
    /// Recommended country for a locale identifier such as `en_US` or `de-AT.UTF-8`.
    pub fn from_locale(locale: &str) -> Option<Country> {
        let locale = locale.split('.').next().unwrap_or(locale);
        let region = locale.rsplit(['_', '-']).next()?;
        if region.len() != 2 || region.len() == locale.len() {
            return None;
        }
        Country::from_code(region)
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.friendly_name())
    }
}

/// One recurring holiday with its observed dates, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub name: String,
    pub dates: Vec<NaiveDate>,
}

impl Holiday {
    pub fn new(name: impl Into<String>, mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self {
            name: name.into(),
            dates,
        }
    }

    /// First observed date on or after `today`.
    pub fn next_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        let idx = self.dates.partition_point(|d| *d < today);
        self.dates.get(idx).copied()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    country: Option<String>,
    #[serde(default, rename = "holiday")]
    holidays: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    dates: Vec<String>,
}

/// Immutable per-country holiday table.
#[derive(Debug, Clone, Default)]
pub struct HolidayCatalog {
    countries: BTreeMap<Country, Vec<Holiday>>,
}

impl HolidayCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog generated from the built-in rules for `years` years starting at `first_year`.
    pub fn builtin(first_year: i32, years: u32) -> Self {
        let mut catalog = Self::empty();
        catalog.insert_country(
            Country::UnitedStates,
            rules::united_states(first_year, years),
        );
        catalog
    }

    /// Build a catalog from explicit holiday lists.
    pub fn from_holidays(countries: impl IntoIterator<Item = (Country, Vec<Holiday>)>) -> Self {
        let mut catalog = Self::empty();
        for (country, holidays) in countries {
            catalog.insert_country(country, holidays);
        }
        catalog
    }

    /// Load every `holidays-<CC>.toml` file in `dir` on top of this catalog.
    ///
    /// A file replaces the table for its country. Files whose code is unknown are
    /// skipped with a warning; unreadable or unparseable files are errors.
    pub fn load_dir(mut self, dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read holiday directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(file_code) = stem.strip_prefix(HOLIDAY_FILE_PREFIX) else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read holiday file {}", path.display()))?;
            let (code, holidays) = parse_catalog_file(&content)
                .with_context(|| format!("Failed to parse holiday file {}", path.display()))?;
            let code = code.unwrap_or_else(|| file_code.to_string());

            match Country::from_code(&code) {
                Some(country) => {
                    Log::log_debug(&format!(
                        "Loaded {} holidays for {} from {}",
                        holidays.len(),
                        country,
                        path.display()
                    ));
                    self.insert_country(country, holidays);
                }
                None => Log::log_warning(&format!(
                    "Skipping holiday file {}: unknown country code '{}'",
                    path.display(),
                    code
                )),
            }
        }

        Ok(self)
    }

    fn insert_country(&mut self, country: Country, mut holidays: Vec<Holiday>) {
        holidays.sort_by(|a, b| a.dates.first().cmp(&b.dates.first()).then(a.name.cmp(&b.name)));
        self.countries.insert(country, holidays);
    }

    /// Countries that have at least one holiday.
    pub fn countries(&self) -> impl Iterator<Item = Country> + '_ {
        self.countries.keys().copied()
    }

    /// All holidays for a country; empty when the country has no table.
    pub fn holidays(&self, country: Country) -> &[Holiday] {
        self.countries.get(&country).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn holiday(&self, country: Country, name: &str) -> Option<&Holiday> {
        self.holidays(country).iter().find(|h| h.name == name)
    }

    /// Resolve a holiday by country code. Unknown codes resolve to nothing.
    pub fn holiday_by_code(&self, code: &str, name: &str) -> Option<&Holiday> {
        Country::from_code(code).and_then(|country| self.holiday(country, name))
    }

    /// First occurrence of a holiday on or after `today`.
    pub fn first_date_on_or_after(
        &self,
        country: Country,
        name: &str,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        self.holiday(country, name)?.next_date(today)
    }
}

fn parse_catalog_file(content: &str) -> Result<(Option<String>, Vec<Holiday>)> {
    let file: CatalogFile = toml::from_str(content)?;

    let holidays = file
        .holidays
        .into_iter()
        .map(|entry| {
            let dates = entry
                .dates
                .iter()
                .filter_map(|raw| match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                    Ok(date) => Some(date),
                    Err(_) => {
                        Log::log_warning(&format!(
                            "Dropping malformed date '{}' for holiday '{}'",
                            raw, entry.name
                        ));
                        None
                    }
                })
                .collect();
            Holiday::new(entry.name, dates)
        })
        .collect();

    Ok((file.country, holidays))
}
