//! Centre/country lookups.
//!
//! Two `|`-delimited files, loaded once at construction: a centre
//! table (`centre|patientRange`, one row per centre naming the
//! `RangeSet` of patient numbers it covers) and a country table
//! (`country|centreRange`, one row per country naming the `RangeSet`
//! of centre ids it covers). Membership, not equality, drives both
//! lookups — the same `RangeSet` used for visit/field ranges
//! elsewhere in the configuration.

use sig_domain::RangeSet;
use sig_ports::SiteLookup;
use tracing::warn;

struct Centre {
    id: i64,
    patients: RangeSet,
}

struct Country {
    id: i64,
    centres: RangeSet,
}

#[derive(Default)]
pub struct DelimitedSiteLookup {
    centres: Vec<Centre>,
    countries: Vec<Country>,
}

impl DelimitedSiteLookup {
    /// Parse `centre|patientRange` and `country|centreRange` file
    /// contents. A row whose patient range fails to parse is a "bad
    /// centre patient range": logged and the whole row skipped. A row
    /// whose centre range fails to parse keeps the country but resets
    /// its range to empty (matches nothing) rather than dropping the
    /// row, per the distinct recovery the two error kinds specify.
    pub fn parse(centre_content: &str, country_content: &str) -> Self {
        let mut centres = Vec::new();
        for (idx, line) in centre_content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some((id_str, range_str)) = trimmed.split_once('|') else {
                warn!(line = idx + 1, "malformed centre row skipped");
                continue;
            };
            let Ok(id) = id_str.trim().parse::<i64>() else {
                warn!(line = idx + 1, centre = id_str, "non-numeric centre id, row skipped");
                continue;
            };
            match RangeSet::from_string(range_str.trim()) {
                Ok(patients) => centres.push(Centre { id, patients }),
                Err(_) => {
                    warn!(line = idx + 1, centre = id, "bad centre patient range, row skipped");
                }
            }
        }

        let mut countries = Vec::new();
        for (idx, line) in country_content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some((id_str, range_str)) = trimmed.split_once('|') else {
                warn!(line = idx + 1, "malformed country row skipped");
                continue;
            };
            let Ok(id) = id_str.trim().parse::<i64>() else {
                warn!(line = idx + 1, country = id_str, "non-numeric country id, row skipped");
                continue;
            };
            let centres_range = RangeSet::from_string(range_str.trim()).unwrap_or_else(|_| {
                warn!(line = idx + 1, country = id, "malformed RangeSet in country centres, field reset to empty");
                RangeSet::new()
            });
            countries.push(Country { id, centres: centres_range });
        }

        Self { centres, countries }
    }
}

impl SiteLookup for DelimitedSiteLookup {
    fn site_for_patient(&self, patient: i64) -> Option<i64> {
        self.centres.iter().find(|c| c.patients.contains(patient)).map(|c| c.id)
    }

    fn country_for_site(&self, site: i64) -> Option<i64> {
        self.countries.iter().find(|c| c.centres.contains(site)).map(|c| c.id)
    }
}
