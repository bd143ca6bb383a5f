use std::collections::HashSet;

/// Russian function words, the list most news preprocessing starts from.
const RUSSIAN: &[&str] = &[
    "и", "в", "во", "не", "что", "он", "на", "я", "с", "со", "как", "а", "то", "все", "она",
    "так", "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по", "только", "ее",
    "мне", "было", "вот", "от", "меня", "еще", "нет", "о", "из", "ему", "теперь", "когда",
    "даже", "ну", "вдруг", "ли", "если", "уже", "или", "ни", "быть", "был", "него", "до",
    "вас", "нибудь", "опять", "уж", "вам", "ведь", "там", "потом", "себя", "ничего", "ей",
    "может", "они", "тут", "где", "есть", "надо", "ней", "для", "мы", "тебя", "их", "чем",
    "была", "сам", "чтоб", "без", "будто", "чего", "раз", "тоже", "себе", "под", "будет",
    "ж", "тогда", "кто", "этот", "того", "потому", "этого", "какой", "совсем", "ним",
    "здесь", "этом", "один", "почти", "мой", "тем", "чтобы", "нее", "сейчас", "были", "куда",
    "зачем", "всех", "никогда", "можно", "при", "наконец", "два", "об", "другой", "хоть",
    "после", "над", "больше", "тот", "через", "эти", "нас", "про", "всего", "них", "какая",
    "много", "разве", "три", "эту", "моя", "впрочем", "хорошо", "свою", "этой", "перед",
    "иногда", "лучше", "чуть", "том", "нельзя", "такой", "им", "более", "всегда", "конечно",
    "всю", "между",
];

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Prepositions, conjunctions and particles that survive the base list but
/// make useless keywords.
const EXTENDED: &[&str] = &[
    "это", "эта", "также", "либо", "ещё", "весь", "вся", "всё", "свой", "своя", "свои", "своих",
    "который", "которая", "которое", "которые", "которых", "которой", "котором", "этих",
    "такие", "такая", "такое", "таких", "из-за", "из-под", "около", "вокруг", "среди",
    "против", "вместо", "кроме", "ради", "вдоль", "сквозь", "однако", "зато", "причем",
    "притом", "поэтому", "пока", "ибо", "словно", "якобы", "лишь", "именно", "вроде",
    "почему", "очень", "вновь", "снова", "whether", "also", "via", "upon",
    "within", "without", "among", "amid", "onto", "toward", "towards", "yet", "though",
    "although", "unless", "since", "per", "says", "said",
];

/// A set of words dropped during tokenization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWords(HashSet<String>);

impl StopWords {
    /// Russian and English function words.
    pub fn builtin() -> Self {
        Self::from_lists(&[RUSSIAN, ENGLISH])
    }

    /// The builtin list plus extra prepositions, conjunctions and particles.
    pub fn extended() -> Self {
        Self::from_lists(&[RUSSIAN, ENGLISH, EXTENDED])
    }

    fn from_lists(lists: &[&[&str]]) -> Self {
        Self(
            lists
                .iter()
                .flat_map(|l| l.iter())
                .map(|w| (*w).to_owned())
                .collect(),
        )
    }

    /// Add caller-supplied words, lowercased.
    #[must_use]
    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.0
            .extend(extra.into_iter().map(|w| w.as_ref().trim().to_lowercase()));
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists() {
        let builtin = StopWords::builtin();
        assert!(builtin.contains("и"));
        assert!(builtin.contains("the"));
        assert!(!builtin.contains("которые"));

        let extended = StopWords::extended();
        assert!(extended.contains("которые"));
        assert!(extended.len() > builtin.len());
    }

    #[test]
    fn test_extra_words_are_lowercased() {
        let words = StopWords::default().with_extra(["Новости ", "RSS"]);
        assert!(words.contains("новости"));
        assert!(words.contains("rss"));
        assert_eq!(words.len(), 2);
    }
}
