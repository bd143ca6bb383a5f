use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{
    error::KeywordError,
    stopwords::StopWords,
    vectorizer::{TfidfConfig, TfidfVectorizer, tokenize},
};

const MIN_KEYWORD_CHARS: usize = 3;
const MAX_KEYWORD_CHARS: usize = 50;
/// Bonus per document containing a term.
const DOCUMENT_BONUS: f64 = 0.1;

/// A term's single multiplier: `1 + 0.1 × documents whose word set holds
/// it`. Word sets hold single words, so n-grams of two or more words always
/// get `1.0`.
fn document_bonus(term: &str, word_sets: &[HashSet<String>]) -> f64 {
    let doc_count = word_sets.iter().filter(|s| s.contains(term)).count();
    1.0 + DOCUMENT_BONUS * doc_count as f64
}

fn keyword_length_ok(term: &str) -> bool {
    let len = term.chars().count();
    (MIN_KEYWORD_CHARS..=MAX_KEYWORD_CHARS).contains(&len)
}

/// Ranks the terms that best describe a small group of texts.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    top_keywords: usize,
    stop_words: StopWords,
    local_model: TfidfConfig,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(20)
    }
}

impl KeywordExtractor {
    pub fn new(top_keywords: usize) -> Self {
        Self {
            top_keywords,
            stop_words: StopWords::extended(),
            local_model: TfidfConfig {
                max_features: 150,
                min_df: 1,
                max_df: 0.98,
                ngram_range: (1, 3),
                sublinear_tf: true,
                lowercase: true,
            },
        }
    }

    pub fn top_keywords(&self) -> usize {
        self.top_keywords
    }

    /// Ranked keywords, most relevant first. Falls back to plain term
    /// frequencies when the local model can't produce any.
    pub fn extract<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        match self.ranked_terms(texts) {
            Ok(keywords) => keywords,
            Err(e) => {
                debug!(error = %e, texts = texts.len(), "using frequency fallback for keywords");
                self.frequency_fallback(texts)
            }
        }
    }

    /// Fit a TF-IDF model on the group alone and rank its terms by summed
    /// weight, boosted by how many documents contain the term as a word.
    pub fn ranked_terms<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<String>, KeywordError> {
        let tfidf = TfidfVectorizer::new(self.local_model.clone())
            .with_stop_words(self.stop_words.clone())
            .fit_transform(texts)?;

        let word_sets = texts
            .iter()
            .map(|t| tokenize(t.as_ref(), true).into_iter().collect::<HashSet<String>>())
            .collect::<Vec<_>>();

        let scores = tfidf
            .vocabulary
            .iter()
            .zip(tfidf.matrix.columns())
            .map(|(term, column)| column.sum() * document_bonus(term, &word_sets))
            .collect::<Vec<f64>>();

        let mut order = (0..scores.len()).collect::<Vec<usize>>();
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let keywords = order
            .into_iter()
            .map(|i| &tfidf.vocabulary[i])
            .filter(|term| keyword_length_ok(term))
            .take(self.top_keywords)
            .cloned()
            .collect::<Vec<String>>();

        if keywords.is_empty() {
            return Err(KeywordError::NoTerms);
        }
        Ok(keywords)
    }

    /// Most frequent words that aren't stopwords, ties in first-seen order.
    pub fn frequency_fallback<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let words = texts
            .iter()
            .flat_map(|t| tokenize(t.as_ref(), true))
            .filter(|w| keyword_length_ok(w) && !self.stop_words.contains(w));
        for (position, word) in words.enumerate() {
            counts.entry(word).or_insert((0, position)).0 += 1;
        }

        let mut ranked = counts.into_iter().collect::<Vec<_>>();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });
        ranked
            .into_iter()
            .take(self.top_keywords)
            .map(|(word, _)| word)
            .collect()
    }
}
