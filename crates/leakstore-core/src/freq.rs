//! Frequency Tables
//!
//! A [`FrequencyTable`] maps a derived key (e.g. top-level domain) to a
//! non-negative count. Per-bucket tables are built independently and merged
//! into one global table; the merge is a plain sum, so it is associative and
//! commutative and partial or reordered merges yield identical results.
//!
//! Serialized form is one `key,count` line per entry. The sorted emission
//! order is count descending with ties broken by key ascending, so the
//! global artifact is deterministic regardless of bucket processing order.

use std::collections::HashMap;

/// Derived key for a dotted string field: the lowercase last dot-label.
///
/// `mail.Example.COM` -> `com`; a key without dots maps to itself,
/// lowercased.
pub fn derive_tld(key: &str) -> String {
    key.rsplit('.')
        .next()
        .unwrap_or(key)
        .trim()
        .to_ascii_lowercase()
}

/// Key -> count mapping with order-independent merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count for `key` by one.
    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Add `count` to the count for `key`.
    pub fn add(&mut self, key: &str, count: u64) {
        if let Some(existing) = self.counts.get_mut(key) {
            *existing += count;
        } else {
            self.counts.insert(key.to_string(), count);
        }
    }

    /// Sum another table into this one.
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (key, count) in &other.counts {
            self.add(key, *count);
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries sorted by count descending, key ascending on ties.
    pub fn sorted_entries(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// Serialize as `key,count` lines in sorted order.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for (key, count) in self.sorted_entries() {
            out.push_str(&key);
            out.push(',');
            out.push_str(&count.to_string());
            out.push('\n');
        }
        out
    }

    /// Parse one `key,count` line. Returns `None` for lines that do not
    /// carry exactly two fields with a numeric count.
    pub fn parse_line(line: &str) -> Option<(&str, u64)> {
        let (key, count) = line.split_once(',')?;
        if key.is_empty() || count.contains(',') {
            return None;
        }
        let count: u64 = count.trim().parse().ok()?;
        Some((key, count))
    }
}

impl FromIterator<(String, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (key, count) in iter {
            table.add(&key, count);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, u64)]) -> FrequencyTable {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_derive_tld() {
        assert_eq!(derive_tld("a.com"), "com");
        assert_eq!(derive_tld("mail.Example.ORG"), "org");
        assert_eq!(derive_tld("localhost"), "localhost");
        assert_eq!(derive_tld("a.CO.UK "), "uk");
    }

    #[test]
    fn test_increment_and_get() {
        let mut t = FrequencyTable::new();
        t.increment("com");
        t.increment("com");
        t.increment("org");
        assert_eq!(t.get("com"), 2);
        assert_eq!(t.get("org"), 1);
        assert_eq!(t.get("net"), 0);
        assert_eq!(t.total(), 3);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = table(&[("com", 1), ("org", 1)]);
        let b = table(&[("com", 3)]);
        a.merge(&b);
        assert_eq!(a, table(&[("com", 4), ("org", 1)]));
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = table(&[("com", 1), ("org", 2)]);
        let b = table(&[("com", 5), ("net", 1)]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.sorted_entries(), ba.sorted_entries());
    }

    #[test]
    fn test_merge_is_associative() {
        let a = table(&[("com", 1)]);
        let b = table(&[("com", 2), ("org", 1)]);
        let c = table(&[("net", 7)]);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left, right);
    }

    #[test]
    fn test_sorted_entries_count_desc_key_asc() {
        let t = table(&[("org", 1), ("com", 4), ("net", 1), ("de", 4)]);
        assert_eq!(
            t.sorted_entries(),
            vec![
                ("com".to_string(), 4),
                ("de".to_string(), 4),
                ("net".to_string(), 1),
                ("org".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_csv_emission() {
        let t = table(&[("com", 4), ("org", 1)]);
        assert_eq!(t.to_csv(), "com,4\norg,1\n");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(FrequencyTable::parse_line("com,4"), Some(("com", 4)));
        assert_eq!(FrequencyTable::parse_line("com,4\n".trim()), Some(("com", 4)));
        assert_eq!(FrequencyTable::parse_line("noseparator"), None);
        assert_eq!(FrequencyTable::parse_line("com,abc"), None);
        assert_eq!(FrequencyTable::parse_line(",4"), None);
        assert_eq!(FrequencyTable::parse_line("a,b,c"), None);
    }
}
