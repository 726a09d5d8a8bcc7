//! The family catalog: the fixed, ordered universe of family compositions.
//!
//! Every other table refers to a composition by its position in the catalog
//! (the family index). The first composition must be the childless family, which
//! is where every lineage starts.
//!
//! Text format: one family per line, child ages separated by whitespace. An empty
//! line is the childless family.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::constants::MAX_CHILD_AGE;
use crate::errors::CatalogError;
use crate::types::AgeSet;

/// The standard catalog: every family whose children are aged 1..=14 with at
/// least two years between consecutive births (987 compositions).
const EMBEDDED_FAMILIES: &str = include_str!("../data/families.txt");

#[derive(Clone, Debug)]
pub struct FamilyCatalog {
    families: Vec<AgeSet>,
    index: HashMap<AgeSet, usize>,
    age_at_maturity: u32,
}

impl FamilyCatalog {
    /// Build a catalog from an ordered list of distinct compositions.
    pub fn from_families(families: Vec<AgeSet>) -> Result<Self, CatalogError> {
        let first = *families.first().ok_or(CatalogError::Empty)?;
        if !first.is_empty() {
            return Err(CatalogError::FirstNotEmpty(first.ages().collect()));
        }

        let mut index = HashMap::with_capacity(families.len());
        for (i, &family) in families.iter().enumerate() {
            if let Some(prev) = index.insert(family, i) {
                return Err(CatalogError::Duplicate {
                    ages: family.ages().collect(),
                    first: prev + 1,
                    second: i + 1,
                });
            }
        }

        let age_at_maturity = families
            .iter()
            .filter_map(|f| f.oldest())
            .max()
            .map_or(0, |oldest| oldest + 1);

        Ok(Self {
            families,
            index,
            age_at_maturity,
        })
    }

    /// Parse the text format. Every token must be a non-negative integer age.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut families = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let mut family = AgeSet::EMPTY;
            for token in line.split_whitespace() {
                let age: u32 = token.parse().map_err(|_| CatalogError::InvalidAge {
                    line: n + 1,
                    token: token.to_string(),
                })?;
                if age > MAX_CHILD_AGE {
                    return Err(CatalogError::AgeOutOfRange {
                        line: n + 1,
                        age,
                        max: MAX_CHILD_AGE,
                    });
                }
                family.insert(age);
            }
            families.push(family);
        }
        Self::from_families(families)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// The standard 987-family catalog shipped with the crate.
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_FAMILIES).expect("embedded family catalog is valid")
    }

    /// Every family with children aged `1..=oldest_child` whose consecutive ages
    /// differ by at least `min_spacing`, ordered by size then by ages.
    pub fn with_min_spacing(oldest_child: u32, min_spacing: u32) -> Result<Self, CatalogError> {
        if oldest_child > MAX_CHILD_AGE {
            return Err(CatalogError::AgeOutOfRange {
                line: 0,
                age: oldest_child,
                max: MAX_CHILD_AGE,
            });
        }
        let spacing = min_spacing.max(1);
        let mut families = Vec::new();
        let mut stack: Vec<(u32, AgeSet)> = vec![(1, AgeSet::EMPTY)];
        while let Some((next_age, family)) = stack.pop() {
            families.push(family);
            for age in next_age..=oldest_child {
                stack.push((age + spacing, family.with(age)));
            }
        }
        families.sort_by_key(|f| (f.len(), f.ages().collect::<Vec<_>>()));
        Self::from_families(families)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, family_index: usize) -> AgeSet {
        self.families[family_index]
    }

    /// Family index of a composition, if the catalog contains it.
    #[inline(always)]
    pub fn index_of(&self, family: AgeSet) -> Option<usize> {
        self.index.get(&family).copied()
    }

    /// Oldest child age in the catalog + 1.
    pub fn age_at_maturity(&self) -> u32 {
        self.age_at_maturity
    }

    pub fn families(&self) -> &[AgeSet] {
        &self.families
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog() {
        let catalog = FamilyCatalog::embedded();
        assert_eq!(catalog.len(), 987);
        assert_eq!(catalog.age_at_maturity(), 15);
        assert_eq!(catalog.get(0), AgeSet::EMPTY);
        assert_eq!(catalog.get(1), AgeSet::from_ages([1]));
        assert_eq!(
            catalog.get(986),
            AgeSet::from_ages([2, 4, 6, 8, 10, 12, 14])
        );
    }

    #[test]
    fn test_generated_catalog_matches_embedded() {
        let generated = FamilyCatalog::with_min_spacing(14, 2).unwrap();
        let embedded = FamilyCatalog::embedded();
        assert_eq!(generated.families(), embedded.families());
    }

    #[test]
    fn test_parse_and_lookup() {
        let catalog = FamilyCatalog::parse("\n1\n3 1\n2\n").unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.age_at_maturity(), 4);
        assert_eq!(catalog.index_of(AgeSet::from_ages([1, 3])), Some(2));
        assert_eq!(catalog.index_of(AgeSet::from_ages([3])), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(FamilyCatalog::parse(""), Err(CatalogError::Empty)));
        assert!(matches!(
            FamilyCatalog::parse("1\n\n"),
            Err(CatalogError::FirstNotEmpty(_))
        ));
        assert!(matches!(
            FamilyCatalog::parse("\n1 x\n"),
            Err(CatalogError::InvalidAge { line: 2, .. })
        ));
        assert!(matches!(
            FamilyCatalog::parse("\n2 4\n4 2\n"),
            Err(CatalogError::Duplicate {
                first: 2,
                second: 3,
                ..
            })
        ));
        assert!(matches!(
            FamilyCatalog::parse("\n64\n"),
            Err(CatalogError::AgeOutOfRange { age: 64, .. })
        ));
    }

    #[test]
    fn test_childless_catalog_has_no_maturity_age() {
        let catalog = FamilyCatalog::parse("\n").unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.age_at_maturity(), 0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = FamilyCatalog::load(Path::new("/nonexistent/families.txt")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
