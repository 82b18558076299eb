use crate::export::read_records;
use crate::models::{Region, RegionMapping};
use anyhow::Result;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Top-level administrative areas, in display order
pub const MAJOR_AREAS: [&str; 17] = [
    "서울특별시",
    "부산광역시",
    "대구광역시",
    "인천광역시",
    "광주광역시",
    "대전광역시",
    "울산광역시",
    "세종특별자치시",
    "경기도",
    "강원특별자치도",
    "충청북도",
    "충청남도",
    "전라북도",
    "전라남도",
    "경상북도",
    "경상남도",
    "제주특별자치도",
];

/// Majors searched when none are chosen
pub const DEFAULT_MAJOR_COUNT: usize = 3;

/// Which regions a search covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    Nationwide,
    /// Queries within the given majors; `areas` narrows to exact queries
    Regional { majors: Vec<String>, areas: Vec<String> },
}

impl RegionSelection {
    pub fn regional(majors: Vec<String>, areas: Vec<String>) -> Self {
        let majors = if majors.is_empty() {
            MAJOR_AREAS[..DEFAULT_MAJOR_COUNT].iter().map(|m| m.to_string()).collect()
        } else {
            majors
        };
        Self::Regional { majors, areas }
    }
}

/// Resolved regions loaded from the mapping file
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let mappings: Vec<RegionMapping> = read_records(path)?;
        let catalog = Self::from_mappings(&mappings);
        info!(
            "Loaded {} regions ({} mapping rows) from {}",
            catalog.len(),
            mappings.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Keep the first row of each (query, name, code) triple, in file order
    pub fn from_mappings(mappings: &[RegionMapping]) -> Self {
        let mut seen = HashSet::new();
        let regions = mappings
            .iter()
            .map(Region::from)
            .filter(|r| seen.insert(r.clone()))
            .collect();
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Sorted distinct queries under the given majors
    pub fn queries_in(&self, majors: &[String]) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| majors.iter().any(|m| m == major_of(&r.query)))
            .map(|r| r.query.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Regions to search for a selection, in catalog order
    pub fn select(&self, selection: &RegionSelection) -> Vec<Region> {
        match selection {
            RegionSelection::Nationwide => self.regions.clone(),
            RegionSelection::Regional { majors, areas } => {
                for major in majors.iter().filter(|m| !MAJOR_AREAS.contains(&m.as_str())) {
                    warn!("Unknown major area: {}", major);
                }

                let in_majors: HashSet<String> = self.queries_in(majors).into_iter().collect();
                let wanted: HashSet<String> = if areas.is_empty() {
                    in_majors
                } else {
                    areas
                        .iter()
                        .filter(|area| {
                            let known = in_majors.contains(area.as_str());
                            if !known {
                                warn!("Area {} is not under the selected majors, skipping", area);
                            }
                            known
                        })
                        .cloned()
                        .collect()
                };

                self.regions
                    .iter()
                    .filter(|r| wanted.contains(&r.query))
                    .cloned()
                    .collect()
            }
        }
    }
}

/// Major area of a query: its first word
pub fn major_of(query: &str) -> &str {
    query.split_whitespace().next().unwrap_or("")
}
