//! Server-type / region selection and substitution.
use crate::cloud::CloudError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub cpu_family: Option<&'static str>,
    pub min_cores: u32,
    pub min_memory_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerType {
    pub name: String,
    pub cpu_family: String,
    pub cores: u32,
    pub memory_gb: u32,
    pub hourly_price_cents: u32,
}

/// Picks the requested type if available and adequate; otherwise
/// substitutes the cheapest catalog entry that (a) matches the requested
/// CPU family with at least the requested cores/memory, falling back to
/// (b) any family with at least the requested cores/memory. Returns
/// `NoViableSubstitute` if nothing qualifies — provisioning must fail
/// before any resources are created.
pub fn select<'a>(
    catalog: &'a [ServerType],
    requested_name: Option<&str>,
    requirement: Requirement,
) -> Result<(&'a ServerType, bool), CloudError> {
    if let Some(name) = requested_name {
        if let Some(exact) = catalog.iter().find(|t| t.name == name) {
            return Ok((exact, false));
        }
    }

    let same_family = requirement.cpu_family.and_then(|family| {
        cheapest(catalog.iter().filter(|t| {
            t.cpu_family == family
                && t.cores >= requirement.min_cores
                && t.memory_gb >= requirement.min_memory_gb
        }))
    });
    if let Some(found) = same_family {
        return Ok((found, true));
    }

    let any_family = cheapest(
        catalog
            .iter()
            .filter(|t| t.cores >= requirement.min_cores && t.memory_gb >= requirement.min_memory_gb),
    );
    any_family.map(|t| (t, true)).ok_or(CloudError::NoViableSubstitute)
}

fn cheapest<'a>(iter: impl Iterator<Item = &'a ServerType>) -> Option<&'a ServerType> {
    iter.min_by_key(|t| t.hourly_price_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<ServerType> {
        vec![
            ServerType { name: "cx22".into(), cpu_family: "intel".into(), cores: 2, memory_gb: 4, hourly_price_cents: 1 },
            ServerType { name: "cax11".into(), cpu_family: "arm".into(), cores: 2, memory_gb: 4, hourly_price_cents: 1 },
            ServerType { name: "cx32".into(), cpu_family: "intel".into(), cores: 4, memory_gb: 8, hourly_price_cents: 2 },
        ]
    }

    #[test]
    fn exact_match_wins() {
        let (chosen, substituted) = select(&catalog(), Some("cx22"), Requirement { cpu_family: Some("intel"), min_cores: 2, min_memory_gb: 4 }).unwrap();
        assert_eq!(chosen.name, "cx22");
        assert!(!substituted);
    }

    #[test]
    fn unavailable_type_substitutes_same_family() {
        let (chosen, substituted) = select(&catalog(), Some("cx99"), Requirement { cpu_family: Some("intel"), min_cores: 2, min_memory_gb: 4 }).unwrap();
        assert_eq!(chosen.name, "cx22");
        assert!(substituted);
    }

    #[test]
    fn falls_back_to_any_family_when_requested_family_absent() {
        let (chosen, _) = select(&catalog(), None, Requirement { cpu_family: Some("ppc"), min_cores: 2, min_memory_gb: 4 }).unwrap();
        assert_eq!(chosen.name, "cx22");
    }

    #[test]
    fn no_viable_type_fails_before_provisioning() {
        let err = select(&catalog(), None, Requirement { cpu_family: None, min_cores: 999, min_memory_gb: 999 }).unwrap_err();
        assert!(matches!(err, CloudError::NoViableSubstitute));
    }
}
