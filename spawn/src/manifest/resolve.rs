//! Fuzzy name resolution shared by manifest and registry lookups.
use strsim::levenshtein;

const MAX_DISTANCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Agent,
    Cloud,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub key: String,
    pub kind: Kind,
}

/// One resolvable entry: its key, display name, and kind.
pub struct Candidate<'a> {
    pub key: &'a str,
    pub display_name: &'a str,
    pub kind: Kind,
}

/// Resolves `input` against `own_kind` candidates first (exact key,
/// case-insensitive key, case-insensitive display name), then against
/// `opposite_kind` candidates for the "you swapped the arguments" hint, and
/// finally falls back to Levenshtein distance over both sets combined.
pub fn resolve<'a>(input: &str, candidates: &[Candidate<'a>]) -> Option<Suggestion> {
    if let Some(exact) = exact_match(input, candidates) {
        return Some(exact);
    }
    closest_match(input, candidates)
}

fn exact_match<'a>(input: &str, candidates: &[Candidate<'a>]) -> Option<Suggestion> {
    if let Some(c) = candidates.iter().find(|c| c.key == input) {
        return Some(suggestion(c));
    }
    let lower = input.to_lowercase();
    if let Some(c) = candidates.iter().find(|c| c.key.to_lowercase() == lower) {
        return Some(suggestion(c));
    }
    if let Some(c) = candidates
        .iter()
        .find(|c| c.display_name.to_lowercase() == lower)
    {
        return Some(suggestion(c));
    }
    None
}

fn closest_match<'a>(input: &str, candidates: &[Candidate<'a>]) -> Option<Suggestion> {
    let lower = input.to_lowercase();
    candidates
        .iter()
        .filter_map(|c| {
            let key_dist = levenshtein(&lower, &c.key.to_lowercase());
            let name_dist = levenshtein(&lower, &c.display_name.to_lowercase());
            let dist = key_dist.min(name_dist);
            (dist <= MAX_DISTANCE).then_some((dist, c))
        })
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, c)| suggestion(c))
}

fn suggestion(c: &Candidate) -> Suggestion {
    Suggestion {
        key: c.key.to_string(),
        kind: c.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<Candidate<'static>> {
        vec![
            Candidate { key: "claude", display_name: "Claude Code", kind: Kind::Agent },
            Candidate { key: "codex", display_name: "Codex CLI", kind: Kind::Agent },
        ]
    }

    #[test]
    fn exact_key_match() {
        let found = resolve("claude", &agents()).unwrap();
        assert_eq!(found.key, "claude");
    }

    #[test]
    fn clod_resolves_to_claude_within_distance_three() {
        let found = resolve("Clod", &agents()).unwrap();
        assert_eq!(found.key, "claude");
    }

    #[test]
    fn far_input_resolves_to_nothing() {
        assert!(resolve("qwertyui", &agents()).is_none());
    }

    #[test]
    fn case_insensitive_display_name_match() {
        let found = resolve("codex cli", &agents()).unwrap();
        assert_eq!(found.key, "codex");
    }
}
