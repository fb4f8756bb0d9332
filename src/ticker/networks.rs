//! Broadcast network display-name resolution.
//!
//! Raw schedule payloads carry regional callsigns ("FDSN1") and internal
//! labels ("ESPN Select"). Embedders want a short, stable display list, so
//! networks go through two configurable steps:
//!
//! 1. preferred filtering/ordering: keep networks matching a configured
//!    pattern list, in the list's order (all networks when nothing matches);
//! 2. display mapping: pattern mappings first (first match wins), then
//!    exact-name mappings, then the raw string unchanged.

use std::collections::HashMap;

/// Network display configuration, assembled from [`crate::config::Config`].
#[derive(Debug, Clone, Default)]
pub struct NetworkNaming {
    /// Ordering/filter patterns, e.g. `["TNT", "ESPN*", "FDSN*"]`.
    pub preferred: Vec<String>,
    /// Pattern → display name, first match wins, e.g. `("FDS*", "FanDuel Sports North")`.
    pub patterns: Vec<(String, String)>,
    /// Exact raw name → display name, e.g. `"ESPN Select" → "ESPN+"`.
    pub exact: HashMap<String, String>,
}

impl NetworkNaming {
    /// Final display list: preferred ordering on raw names, then mapping to
    /// display names, deduped preserving first occurrence.
    pub fn display_list(&self, raw: &[String]) -> Vec<String> {
        let preferred = self.apply_preferred(raw);
        let mapped: Vec<String> = preferred.iter().map(|n| self.display_name(n)).collect();
        dedupe_preserve_order(mapped)
    }

    fn apply_preferred(&self, raw: &[String]) -> Vec<String> {
        let cleaned: Vec<&str> = raw
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Vec::new();
        }
        if self.preferred.is_empty() {
            return dedupe_preserve_order(cleaned.iter().map(|s| s.to_string()).collect());
        }

        let mut picked: Vec<String> = Vec::new();
        for pattern in &self.preferred {
            for net in &cleaned {
                if pattern_matches(pattern, net) {
                    picked.push((*net).to_string());
                }
            }
        }

        // Nothing preferred present: show what we have rather than nothing.
        if picked.is_empty() {
            picked = cleaned.iter().map(|s| s.to_string()).collect();
        }
        dedupe_preserve_order(picked)
    }

    fn display_name(&self, net: &str) -> String {
        for (pattern, mapped) in &self.patterns {
            if pattern_matches(pattern, net) {
                return mapped.clone();
            }
        }
        self.exact.get(net).cloned().unwrap_or_else(|| net.to_string())
    }
}

/// Case-insensitive fuzzy match between a configured pattern and a network
/// string. Patterns containing `*`/`?` glob; anything else matches exactly
/// or as a prefix (so "FDSN" covers "FDSN1" and "FDSNX").
pub fn pattern_matches(pattern: &str, text: &str) -> bool {
    let p = pattern.trim().to_lowercase();
    let t = text.trim().to_lowercase();
    if p.is_empty() || t.is_empty() {
        return false;
    }
    if p.contains('*') || p.contains('?') {
        return glob_matches(&p, &t);
    }
    t == p || t.starts_with(&p)
}

/// Minimal glob: `*` matches any run, `?` matches one character. Iterative
/// with star backtracking, linear in the common case.
fn glob_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn dedupe_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
