use tracing::debug;

use super::{
    error::NarrativeError,
    keywords::KeywordExtractor,
    model::{ClusterLabel, Narrative, NewsItem, RepresentativeExample, group_indices},
};

/// Turns a clustering of news items into ranked narratives.
#[derive(Debug, Clone)]
pub struct NarrativeBuilder {
    top_titles: usize,
    use_titles_only: bool,
    extractor: KeywordExtractor,
}

impl Default for NarrativeBuilder {
    fn default() -> Self {
        Self::new(20, 10, true)
    }
}

impl NarrativeBuilder {
    pub fn new(top_keywords: usize, top_titles: usize, use_titles_only: bool) -> Self {
        Self {
            top_titles,
            use_titles_only,
            extractor: KeywordExtractor::new(top_keywords),
        }
    }

    /// The `top_n` largest clusters as narratives, largest first. Equal sizes
    /// keep ascending label order. Noise is never a narrative.
    pub fn build(
        &self,
        items: &[NewsItem],
        labels: &[ClusterLabel],
        top_n: usize,
    ) -> Result<Vec<Narrative>, NarrativeError> {
        if items.len() != labels.len() {
            return Err(NarrativeError::LengthMismatch {
                items: items.len(),
                labels: labels.len(),
            });
        }

        let mut groups = group_indices(labels).into_iter().collect::<Vec<_>>();
        groups.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));

        let narratives = groups
            .into_iter()
            .take(top_n)
            .map(|(cluster_id, members)| {
                let members = members.iter().map(|&i| &items[i]).collect::<Vec<&NewsItem>>();
                self.narrative(cluster_id, &members)
            })
            .collect::<Vec<Narrative>>();

        debug!(narratives = narratives.len(), top_n, "narratives built");
        Ok(narratives)
    }

    fn narrative(&self, cluster_id: ClusterLabel, members: &[&NewsItem]) -> Narrative {
        let texts = members
            .iter()
            .map(|item| item.text(self.use_titles_only))
            .collect::<Vec<String>>();
        let keywords = self.extractor.extract(&texts);
        let representative_examples = members
            .iter()
            .take(self.top_titles)
            .map(|item| RepresentativeExample::from(*item))
            .collect();

        Narrative {
            cluster_id,
            size: members.len(),
            keywords,
            representative_examples,
            news_count: members.len(),
        }
    }
}
