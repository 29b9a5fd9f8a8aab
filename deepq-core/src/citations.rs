//! Deterministic citation section appended to every report

use crate::Source;

/// Heading that opens the citation section
pub const SOURCES_HEADER: &str = "\n\n## Sources\n\n";

/// One citation line: `{index}. [{title}] ({year}) - {url}`
pub fn format_citation(index: usize, source: &Source) -> String {
    format!("{}. [{}] ({}) - {}", index, source.title, source.year, source.url)
}

/// Header followed by one 1-based line per source. The header is emitted
/// even when there are no sources.
pub fn format_citations(sources: &[Source]) -> String {
    let mut section = String::from(SOURCES_HEADER);
    for (i, source) in sources.iter().enumerate() {
        section.push_str(&format_citation(i + 1, source));
        section.push('\n');
    }
    section
}

/// Join the model's narrative with the citation section
pub fn append_citations(narrative: &str, sources: &[Source]) -> String {
    format!("{}\n\n{}", narrative, format_citations(sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_citation_line() {
        let source = Source::new("Rust Book", "https://doc.rust-lang.org/book", "2024");
        assert_eq!(
            format_citation(1, &source),
            "1. [Rust Book] (2024) - https://doc.rust-lang.org/book"
        );
    }

    #[test]
    fn test_empty_sources_keeps_header() {
        assert_eq!(format_citations(&[]), "\n\n## Sources\n\n");
        let report = append_citations("Body", &[]);
        assert!(report.starts_with("Body\n\n"));
        assert!(report.ends_with("## Sources\n\n"));
    }

    #[test]
    fn test_numbering_is_one_based() {
        let sources = vec![
            Source::new("A", "https://a.example", "N/A"),
            Source::new("B", "https://b.example", "2021"),
        ];
        let section = format_citations(&sources);
        assert!(section.contains("1. [A] (N/A) - https://a.example\n"));
        assert!(section.ends_with("2. [B] (2021) - https://b.example\n"));
    }
}
