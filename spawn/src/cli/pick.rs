//! `spawn pick` reads tab-separated `value\tlabel\thint` lines from stdin
//! and writes the chosen value to stdout. Full interactive TUI selection
//! (color, raw-mode keystrokes) is left to an external collaborator; this
//! implements only the portable non-TTY contract, the only case the core
//! itself drives.
use std::io::{BufRead, Write};

pub struct PickOption {
    pub value: String,
    pub label: String,
    pub hint: String,
}

fn parse_options(input: impl BufRead) -> Vec<PickOption> {
    input
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, '\t');
            PickOption {
                value: parts.next().unwrap_or_default().to_string(),
                label: parts.next().unwrap_or_default().to_string(),
                hint: parts.next().unwrap_or_default().to_string(),
            }
        })
        .collect()
}

/// All UI chrome (the prompt text, each option's label/hint) goes to
/// `chrome`; only the chosen value goes to `out`.
pub fn run(
    input: impl BufRead,
    out: &mut impl Write,
    chrome: &mut impl Write,
    prompt: &str,
    default: Option<&str>,
) -> std::io::Result<()> {
    let options = parse_options(input);
    writeln!(chrome, "{prompt}")?;
    for option in &options {
        writeln!(chrome, "  {} - {} ({})", option.value, option.label, option.hint)?;
    }
    let chosen = default
        .map(str::to_string)
        .or_else(|| options.first().map(|o| o.value.clone()))
        .unwrap_or_default();
    writeln!(out, "{chosen}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_default_when_no_interactive_selection_is_possible() {
        let input = b"us-east\tUS East\tlowest latency to the Atlantic\neu-central\tEU Central\tGDPR zone\n";
        let mut out = Vec::new();
        let mut chrome = Vec::new();
        run(&input[..], &mut out, &mut chrome, "Pick a region", Some("eu-central")).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "eu-central\n");
    }

    #[test]
    fn falls_back_to_the_first_option_without_a_default() {
        let input = b"a\tA\thint\nb\tB\thint\n";
        let mut out = Vec::new();
        let mut chrome = Vec::new();
        run(&input[..], &mut out, &mut chrome, "Pick one", None).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\n");
    }
}
