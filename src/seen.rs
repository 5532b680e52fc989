//! Life-list matching.
//!
//! A [`SeenSet`] holds the lowercased scientific names someone has already
//! recorded, either from an iNaturalist life list or from local notes.
//! Matching falls back from a trinomial ("quercus agrifolia var.
//! oxyadenia") to its binomial ("quercus agrifolia"), never the other way
//! round. Entries in the set are not truncated.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::info;

use crate::error::{CatreesError, Result};
use crate::SpeciesSummary;

/// The genus + species part of a name with more than two words.
///
/// Returns `None` for names of two words or fewer.
///
/// ```rust
/// use catrees::binomial;
///
/// assert_eq!(binomial("quercus agrifolia var. oxyadenia").as_deref(), Some("quercus agrifolia"));
/// assert_eq!(binomial("quercus agrifolia"), None);
/// ```
pub fn binomial(name: &str) -> Option<String> {
    let mut tokens = name.split_whitespace();
    let genus = tokens.next()?;
    let epithet = tokens.next()?;
    tokens.next()?;
    Some(format!("{} {}", genus, epithet))
}

/// Whether `candidate` is already in `seen`, directly or by its binomial.
///
/// `seen` is expected to hold lowercased names; `candidate` is lowercased
/// here. The set is never modified.
pub fn is_seen(candidate: &str, seen: &HashSet<String>) -> bool {
    let name = candidate.to_lowercase();
    if seen.contains(&name) {
        return true;
    }
    match binomial(&name) {
        Some(species) => seen.contains(&species),
        None => false,
    }
}

/// Set of lowercased scientific names already recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    names: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from names in any case.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    /// Parse a plain-text list: one name per line, blank lines and `#` comments ignored.
    pub fn from_lines(text: &str) -> Self {
        Self::from_names(
            text.lines()
                .map(|line| line.split('#').next().unwrap_or("").trim())
                .filter(|line| !line.is_empty()),
        )
    }

    /// Add a name (lowercased). Returns `false` if it was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.names.insert(name)
    }

    /// Whether `candidate` counts as seen (see [`is_seen`]).
    pub fn contains_taxon(&self, candidate: &str) -> bool {
        is_seen(candidate, &self.names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Borrow the underlying name set.
    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    /// Drop summaries whose taxon is already seen, keeping the order of the rest.
    pub fn filter_unseen(&self, summaries: Vec<SpeciesSummary>) -> Vec<SpeciesSummary> {
        summaries
            .into_iter()
            .filter(|s| !self.contains_taxon(&s.scientific_name))
            .collect()
    }
}

/// Append a sighting of `name` to a plain-text seen file.
///
/// The file uses the [`SeenSet::from_lines`] format and is created if it
/// does not exist. Returns `Ok(false)` without writing when the file already
/// lists exactly this name (case-insensitive).
pub fn record_seen(path: &Path, name: &str) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() || name.contains('#') || name.contains('\n') {
        return Err(CatreesError::invalid(format!("cannot record species name {:?}", name)));
    }

    let existing = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if SeenSet::from_lines(&existing).names().contains(&name.to_lowercase()) {
        return Ok(false);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}", name)?;
    info!("[SeenSet] Recorded '{}' in {}", name, path.display());
    Ok(true)
}

impl Extend<String> for SeenSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        for name in iter {
            self.insert(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::{GpsPoint, Observation};

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_direct_match() {
        assert!(is_seen("Quercus agrifolia", &set(&["quercus agrifolia"])));
        assert!(!is_seen("Quercus lobata", &set(&["quercus agrifolia"])));
    }

    #[test]
    fn test_variety_falls_back_to_binomial() {
        assert!(is_seen("quercus agrifolia var. oxyadenia", &set(&["quercus agrifolia"])));
        assert!(is_seen("Pinus contorta subsp. murrayana", &set(&["pinus contorta"])));
    }

    #[test]
    fn test_fallback_is_one_directional() {
        assert!(!is_seen("quercus agrifolia", &set(&["quercus agrifolia var. oxyadenia"])));
    }

    #[test]
    fn test_short_names_do_not_fall_back() {
        assert!(!is_seen("quercus", &set(&["quercus agrifolia"])));
        assert!(!is_seen("", &set(&["quercus agrifolia"])));
        assert!(!is_seen("quercus agrifolia", &HashSet::new()));
    }

    #[test]
    fn test_binomial_handles_extra_whitespace() {
        assert_eq!(binomial("  Abies   concolor  var. lowiana").as_deref(), Some("Abies concolor"));
        assert_eq!(binomial("abies"), None);
        assert_eq!(binomial(""), None);
    }

    #[test]
    fn test_seen_set_lowercases() {
        let seen = SeenSet::from_names(["Sequoiadendron giganteum", "CALOCEDRUS DECURRENS"]);
        assert_eq!(seen.len(), 2);
        assert!(seen.contains_taxon("sequoiadendron giganteum"));
        assert!(seen.contains_taxon("Calocedrus decurrens"));
    }

    #[test]
    fn test_from_lines_skips_comments() {
        let seen = SeenSet::from_lines("# my list\nQuercus kelloggii\n\n  Pinus lambertiana  # sugar pine\n");
        assert_eq!(seen.len(), 2);
        assert!(seen.contains_taxon("pinus lambertiana"));
    }

    #[test]
    fn test_insert_reports_duplicates() {
        let mut seen = SeenSet::new();
        assert!(seen.insert("Torreya californica"));
        assert!(!seen.insert("torreya californica"));
        assert!(!seen.insert("  "));
        assert!(!seen.is_empty());
    }

    #[test]
    fn test_filter_unseen_keeps_order() {
        let p = GpsPoint::new(37.0, -122.0);
        let summaries = aggregate(&[
            Observation::new("Quercus agrifolia var. oxyadenia", p, ""),
            Observation::new("Umbellularia californica", p, ""),
            Observation::new("Sequoia sempervirens", p, ""),
        ]);
        let seen = SeenSet::from_names(["quercus agrifolia"]);

        let unseen = seen.filter_unseen(summaries);
        let names: Vec<_> = unseen.iter().map(|s| s.scientific_name.as_str()).collect();
        assert_eq!(names, vec!["umbellularia californica", "sequoia sempervirens"]);
    }

    #[test]
    fn test_record_seen_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");

        assert!(record_seen(&path, "Quercus lobata").unwrap());
        assert!(record_seen(&path, "  Aesculus californica ").unwrap());

        let seen = SeenSet::from_lines(&fs::read_to_string(&path).unwrap());
        assert_eq!(seen.len(), 2);
        assert!(seen.contains_taxon("aesculus californica"));
    }

    #[test]
    fn test_record_seen_skips_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        fs::write(&path, "# oaks\nquercus lobata").unwrap();

        assert!(!record_seen(&path, "Quercus Lobata").unwrap());
        assert!(record_seen(&path, "Quercus lobata var. walteri").unwrap());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "# oaks\nquercus lobata\nQuercus lobata var. walteri\n");
    }

    #[test]
    fn test_record_seen_rejects_unstorable_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");

        assert!(matches!(record_seen(&path, "   "), Err(CatreesError::InvalidArgument(_))));
        assert!(matches!(record_seen(&path, "Pinus # sabiniana"), Err(CatreesError::InvalidArgument(_))));
        assert!(!path.exists());
    }
}
