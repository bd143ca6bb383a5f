use std::fmt::{self, Display, Formatter};

use crate::narr::pipeline::AnalysisReport;

const RULE_WIDTH: usize = 60;
const SUMMARY_KEYWORDS: usize = 5;
const SUMMARY_TITLES: usize = 3;

/// Plain text digest of an [`AnalysisReport`].
#[derive(Debug, Clone, Copy)]
pub struct Summary<'a>(pub &'a AnalysisReport);

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{}", heavy)?;
        writeln!(f, "NARRATIVE MAP - {}", report.analysis_date.format("%d.%m.%Y"))?;
        writeln!(f, "{}", heavy)?;
        writeln!(f)?;
        writeln!(f, "News analyzed: {}", report.total_news)?;
        writeln!(f, "Topics found: {}", report.narratives.len())?;
        if let Some(quality) = &report.quality {
            writeln!(
                f,
                "Clustering quality: {} ({:.2})",
                quality.quality_grade, quality.overall_quality_score
            )?;
        }
        writeln!(f)?;

        for (idx, narrative) in report.narratives.iter().enumerate() {
            writeln!(f, "TOPIC #{} (news: {})", idx + 1, narrative.size)?;
            writeln!(f, "{}", light)?;
            let keywords = narrative
                .keywords
                .iter()
                .take(SUMMARY_KEYWORDS)
                .map(String::as_str)
                .collect::<Vec<&str>>();
            writeln!(f, "Keywords: {}", keywords.join(", "))?;
            writeln!(f)?;
            writeln!(f, "Example titles:")?;
            for example in narrative.representative_examples.iter().take(SUMMARY_TITLES) {
                writeln!(f, "  • {}", example.title)?;
            }
            writeln!(f)?;
        }

        write!(f, "{}", heavy)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::narr::model::{ClusterLabel, Narrative, RepresentativeExample};

    fn narrative(size: usize, keywords: &[&str], titles: &[&str]) -> Narrative {
        Narrative {
            cluster_id: ClusterLabel::from(0),
            size,
            keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
            representative_examples: titles
                .iter()
                .map(|t| RepresentativeExample {
                    title: (*t).to_owned(),
                    link: String::new(),
                    source: "Wire".into(),
                })
                .collect(),
            news_count: size,
        }
    }

    #[test]
    fn test_summary_layout() {
        let report = AnalysisReport {
            analysis_date: Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap(),
            total_news: 42,
            narratives_count: 1,
            narratives: vec![narrative(
                7,
                &["one", "two", "three", "four", "five", "six"],
                &["First", "Second", "Third", "Fourth"],
            )],
            quality: None,
            n_clusters: 1,
            n_noise: 35,
        };
        let text = Summary(&report).to_string();
        assert!(text.contains("NARRATIVE MAP - 09.03.2024"));
        assert!(text.contains("News analyzed: 42"));
        assert!(text.contains("TOPIC #1 (news: 7)"));
        assert!(text.contains("Keywords: one, two, three, four, five\n"));
        assert!(text.contains("  • Third"));
        assert!(!text.contains("Fourth"));
        assert!(!text.contains("Clustering quality"));
    }
}
