use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, LazyLock},
};

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::stopwords::StopWords;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?\S+|www\.\S+").expect("Failed to compile regex!"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+").expect("Failed to compile regex!"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("Failed to compile regex!"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Failed to compile regex!"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingSettings {
    pub min_word_length: usize,
    pub max_word_length: usize,
    /// Added to the builtin stopword list.
    pub stopwords_extra: Vec<String>,
    /// Upper bound on worker threads for batch preprocessing.
    pub max_workers: usize,
    /// Batches larger than this are processed in parallel.
    pub parallel_threshold: usize,
}

impl Default for PreprocessingSettings {
    fn default() -> Self {
        Self {
            min_word_length: 3,
            max_word_length: 20,
            stopwords_extra: Vec::new(),
            max_workers: 4,
            parallel_threshold: 100,
        }
    }
}

/// Normalizes raw text into a space-separated string of content tokens.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    stopwords: StopWords,
    min_word_length: usize,
    max_word_length: usize,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new(StopWords::builtin(), 3, 20)
    }
}

impl TextCleaner {
    pub fn new(stopwords: StopWords, min_word_length: usize, max_word_length: usize) -> Self {
        Self {
            stopwords,
            min_word_length,
            max_word_length,
        }
    }

    pub fn from_settings(settings: &PreprocessingSettings) -> Self {
        Self::new(
            StopWords::builtin().with_extra(&settings.stopwords_extra),
            settings.min_word_length,
            settings.max_word_length,
        )
    }

    /// Lowercase, drop URLs and e-mail addresses, replace anything that isn't
    /// a letter, digit or whitespace, and collapse whitespace.
    pub fn clean_text(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = text.to_lowercase();
        let text = URL.replace_all(&text, "");
        let text = EMAIL.replace_all(&text, "");
        let text = NON_WORD.replace_all(&text, " ");
        WHITESPACE.replace_all(&text, " ").trim().to_owned()
    }

    /// Whitespace tokens of a cleaned text, minus stopwords, pure numbers and
    /// tokens outside the length bounds.
    pub fn tokenize<'a>(&self, cleaned: &'a str) -> Vec<&'a str> {
        cleaned
            .split_whitespace()
            .filter(|token| {
                let len = token.chars().count();
                len >= self.min_word_length && len <= self.max_word_length
            })
            .filter(|token| !self.stopwords.contains(token))
            .filter(|token| !token.chars().all(|c| c.is_numeric()))
            .collect()
    }

    pub fn preprocess(&self, text: &str) -> String {
        let cleaned = self.clean_text(text);
        self.tokenize(&cleaned).join(" ")
    }
}

/// Runs a [`TextCleaner`] over batches, in parallel for large ones. The
/// worker pool is built once and shared by clones.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    cleaner: TextCleaner,
    pool: Option<Arc<ThreadPool>>,
    parallel_threshold: usize,
}

impl Preprocessor {
    /// Without a pool (`max_workers <= 1`, or the pool can't be built) every
    /// batch runs sequentially.
    pub fn new(cleaner: TextCleaner, max_workers: usize, parallel_threshold: usize) -> Self {
        let pool = if max_workers > 1 {
            ThreadPoolBuilder::new()
                .num_threads(max_workers)
                .thread_name(|i| format!("preprocess-{}", i))
                .build()
                .map(Arc::new)
                .inspect_err(|e| {
                    warn!(error = %e, "failed to build preprocessing pool, running sequentially")
                })
                .ok()
        } else {
            None
        };
        Self {
            cleaner,
            pool,
            parallel_threshold,
        }
    }

    pub fn from_settings(settings: &PreprocessingSettings) -> Self {
        Self::new(
            TextCleaner::from_settings(settings),
            settings.max_workers,
            settings.parallel_threshold,
        )
    }

    pub fn cleaner(&self) -> &TextCleaner {
        &self.cleaner
    }

    pub fn workers(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }

    /// Preprocess every text, preserving order. If any unit panics, the
    /// parallel results are discarded and the whole batch is redone
    /// sequentially.
    pub fn preprocess_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<String> {
        let Some(pool) = self.pool.as_ref().filter(|_| texts.len() > self.parallel_threshold)
        else {
            return self.sequential(texts);
        };

        let parallel = catch_unwind(AssertUnwindSafe(|| {
            pool.install(|| {
                texts
                    .par_iter()
                    .map(|t| self.cleaner.preprocess(t.as_ref()))
                    .collect::<Vec<String>>()
            })
        }));
        match parallel {
            Ok(out) => {
                debug!(
                    texts = texts.len(),
                    workers = pool.current_num_threads(),
                    "parallel preprocessing completed"
                );
                out
            }
            Err(_) => {
                warn!(
                    texts = texts.len(),
                    "parallel preprocessing failed, reprocessing sequentially"
                );
                self.sequential(texts)
            }
        }
    }

    fn sequential<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts
            .iter()
            .map(|t| self.cleaner.preprocess(t.as_ref()))
            .collect()
    }
}
