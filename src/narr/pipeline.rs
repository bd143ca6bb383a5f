use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    error::PipelineError,
    model::{Narrative, NewsItem},
    narrative::NarrativeBuilder,
    quality::{QualityEvaluator, QualityReport},
    sink::{RunSink, Stage},
    text::Preprocessor,
    vectorizer::{TfidfMatrix, TfidfVectorizer},
};
use crate::config::Settings;

/// Result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_date: DateTime<Utc>,
    pub total_news: usize,
    pub narratives_count: usize,
    pub narratives: Vec<Narrative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    pub n_clusters: usize,
    pub n_noise: usize,
}

impl AnalysisReport {
    fn empty(analysis_date: DateTime<Utc>) -> Self {
        Self {
            analysis_date,
            total_news: 0,
            narratives_count: 0,
            narratives: Vec::new(),
            quality: None,
            n_clusters: 0,
            n_noise: 0,
        }
    }
}

/// Runs a batch of news items from raw text to narratives.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    preprocessor: Preprocessor,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let preprocessor = Preprocessor::from_settings(&settings.preprocessing);
        Self {
            settings,
            preprocessor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The first `max_news` items.
    pub fn limit<'a>(&self, items: &'a [NewsItem]) -> &'a [NewsItem] {
        let max_news = self.settings.analysis.max_news;
        if items.len() > max_news {
            warn!(
                found = items.len(),
                limit = max_news,
                "too many news items, analyzing only the first ones"
            );
            &items[..max_news]
        } else {
            items
        }
    }

    /// Preprocess and vectorize `items` as given, without applying `max_news`.
    pub fn vectorize(
        &self,
        items: &[NewsItem],
        sink: &dyn RunSink,
    ) -> Result<TfidfMatrix, PipelineError> {
        let settings = &self.settings;
        let started = Instant::now();
        let texts = items
            .iter()
            .map(|item| item.text(settings.analysis.use_titles_only))
            .collect::<Vec<String>>();
        let processed = self.preprocessor.preprocess_batch(&texts);
        sink.stage_completed(Stage::Preprocess, started.elapsed());

        let started = Instant::now();
        let tfidf = TfidfVectorizer::new(settings.vectorization.clone()).fit_transform(&processed)?;
        sink.stage_completed(Stage::Vectorize, started.elapsed());
        Ok(tfidf)
    }

    pub fn run(&self, items: &[NewsItem], sink: &dyn RunSink) -> Result<AnalysisReport, PipelineError> {
        self.run_at(items, sink, Utc::now())
    }

    /// Like [`Pipeline::run`], stamping the report with `analysis_date`.
    pub fn run_at(
        &self,
        items: &[NewsItem],
        sink: &dyn RunSink,
        analysis_date: DateTime<Utc>,
    ) -> Result<AnalysisReport, PipelineError> {
        let settings = &self.settings;
        if items.is_empty() {
            info!("no news items to analyze");
            return Ok(AnalysisReport::empty(analysis_date));
        }

        let items = self.limit(items);
        let use_titles_only = settings.analysis.use_titles_only;
        let tfidf = self.vectorize(items, sink)?;
        let vectors = tfidf.to_feature_vectors();

        let started = Instant::now();
        let clustering = &settings.clustering;
        let clusterer = clustering
            .backend
            .clusterer(&clustering.hdbscan, clustering.dbscan_epsilon)?;
        let outcome = clusterer.cluster(&vectors)?;
        sink.stage_completed(Stage::Cluster, started.elapsed());
        sink.clustering_completed(&outcome);

        let quality = if settings.analysis.evaluate_quality {
            let started = Instant::now();
            let report = QualityEvaluator::new(settings.quality.clone()).evaluate(
                &vectors,
                &outcome.labels,
                outcome.n_clusters,
                outcome.n_noise,
            );
            sink.stage_completed(Stage::Evaluate, started.elapsed());
            sink.quality_evaluated(&report);
            Some(report)
        } else {
            None
        };

        let started = Instant::now();
        let narratives = NarrativeBuilder::new(
            settings.narrative.top_keywords,
            settings.narrative.top_titles,
            use_titles_only,
        )
        .build(items, &outcome.labels, settings.analysis.top_narratives)?;
        sink.stage_completed(Stage::BuildNarratives, started.elapsed());

        info!(
            backend = clusterer.name(),
            news = items.len(),
            terms = tfidf.n_terms(),
            clusters = outcome.n_clusters,
            narratives = narratives.len(),
            "analysis completed"
        );
        Ok(AnalysisReport {
            analysis_date,
            total_news: items.len(),
            narratives_count: narratives.len(),
            narratives,
            quality,
            n_clusters: outcome.n_clusters,
            n_noise: outcome.n_noise,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;
    use crate::narr::{
        cluster::{Backend, DbscanEpsilon, DistanceMetric},
        error::VectorizeError,
        model::ClusteringOutcome,
    };

    #[derive(Default)]
    struct RecordingSink {
        stages: Mutex<Vec<Stage>>,
        clusters: Mutex<Option<usize>>,
    }

    impl RunSink for RecordingSink {
        fn stage_completed(&self, stage: Stage, _elapsed: Duration) {
            self.stages.lock().unwrap().push(stage);
        }

        fn clustering_completed(&self, outcome: &ClusteringOutcome) {
            *self.clusters.lock().unwrap() = Some(outcome.n_clusters);
        }

        fn quality_evaluated(&self, _report: &QualityReport) {}
    }

    fn corpus() -> Vec<NewsItem> {
        let finance = [
            "Центробанк повысил ключевую ставку",
            "Ключевую ставку центробанк повысил снова",
            "Центробанк снова повысил ставку",
            "Повысил центробанк ключевую ставку",
        ];
        let football = [
            "Футбольный клуб выиграл кубок страны",
            "Кубок страны выиграл футбольный клуб",
            "Футбольный клуб снова выиграл кубок",
            "Выиграл кубок страны футбольный клуб",
        ];
        finance
            .iter()
            .chain(football.iter())
            .map(|t| NewsItem::new(*t).with_source("Лента"))
            .collect()
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.clustering.hdbscan.min_cluster_size = 2;
        settings.vectorization.min_df = 1;
        settings
    }

    #[test]
    fn test_two_topics() {
        let sink = RecordingSink::default();
        let report = Pipeline::new(settings()).run(&corpus(), &sink).unwrap();
        assert_eq!(report.total_news, 8);
        assert_eq!(report.n_clusters, 2);
        assert_eq!(report.n_noise, 0);
        assert_eq!(report.narratives_count, 2);
        assert!(report.narratives.iter().all(|n| n.size == 4));
        assert!(report.quality.is_some());
        assert_eq!(
            *sink.stages.lock().unwrap(),
            vec![
                Stage::Preprocess,
                Stage::Vectorize,
                Stage::Cluster,
                Stage::Evaluate,
                Stage::BuildNarratives
            ]
        );
        assert_eq!(*sink.clusters.lock().unwrap(), Some(2));
    }

    #[test]
    fn test_empty_input() {
        let report = Pipeline::default().run(&[], &crate::narr::sink::NullSink).unwrap();
        assert_eq!(report.total_news, 0);
        assert!(report.narratives.is_empty());
        assert!(report.quality.is_none());
    }

    #[test]
    fn test_max_news_and_no_quality() {
        let mut settings = settings();
        settings.analysis.max_news = 4;
        settings.analysis.evaluate_quality = false;
        settings.analysis.top_narratives = 1;
        let report = Pipeline::new(settings)
            .run(&corpus(), &crate::narr::sink::NullSink)
            .unwrap();
        assert_eq!(report.total_news, 4);
        assert!(report.quality.is_none());
        assert!(report.narratives_count <= 1);
    }

    #[test]
    fn test_vocabulary_failure_is_surfaced() {
        let items = vec![NewsItem::new("и на"), NewsItem::new("the and")];
        let err = Pipeline::new(settings())
            .run(&items, &crate::narr::sink::NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Vectorization(VectorizeError::EmptyVocabulary { documents: 2 })
        ));
    }

    #[test]
    fn test_dbscan_backend() {
        let mut settings = settings();
        settings.clustering.backend = Backend::Dbscan;
        settings.clustering.dbscan_epsilon = DbscanEpsilon::try_new(1.0).unwrap();
        settings.clustering.hdbscan.metric = DistanceMetric::Euclidean;
        let report = Pipeline::new(settings)
            .run(&corpus(), &crate::narr::sink::NullSink)
            .unwrap();
        assert_eq!(report.total_news, 8);
        assert!(report.n_clusters >= 1);
    }
}
