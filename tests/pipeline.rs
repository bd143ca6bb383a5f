use chrono::{TimeZone, Utc};
use narrativas::{
    config::Settings,
    display::{ReportWriter, Summary},
    narr::{AnalysisReport, NewsItem, Pipeline, model::UNKNOWN_SOURCE, sink::NullSink},
    store,
};

const FINANCE: [&str; 6] = [
    "Центробанк повысил ключевую ставку до шестнадцати процентов",
    "Ключевая ставка центробанка выросла до шестнадцати процентов",
    "Центробанк объяснил решение повысить ключевую ставку",
    "Аналитики ждали что центробанк повысит ключевую ставку",
    "Рубль укрепился после решения центробанка по ключевой ставке",
    "Ипотека подорожает после повышения ключевой ставки центробанком",
];

const FOOTBALL: [&str; 6] = [
    "Футбольный клуб Спартак выиграл кубок страны",
    "Спартак обыграл Зенит в финале кубка страны",
    "Болельщики Спартака праздновали победу в кубке страны",
    "Тренер Спартака прокомментировал победу в финале кубка",
    "Зенит проиграл Спартаку финал кубка страны по футболу",
    "Капитан Спартака поднял кубок страны над головой",
];

const WEATHER: [&str; 6] = [
    "Синоптики обещают сильный снегопад в Москве",
    "Сильный снегопад парализовал движение в Москве",
    "Коммунальные службы Москвы убирают снег после снегопада",
    "Снегопад в Москве продлится до выходных сообщили синоптики",
    "Из-за снегопада в Москве отменены рейсы",
    "Москвичей предупредили о сильном снегопаде и гололеде",
];

fn as_jsonl(titles: &[&str]) -> String {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            serde_json::json!({
                "id": i,
                "title": title,
                "link": format!("https://news.example/{}", i),
                "source_name": if i % 2 == 0 { "Лента" } else { "" },
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn analyze(settings: Settings, items: &[NewsItem]) -> AnalysisReport {
    let date = Utc.with_ymd_and_hms(2024, 3, 9, 6, 0, 0).unwrap();
    Pipeline::new(settings)
        .run_at(items, &NullSink, date)
        .unwrap()
}

#[test]
fn mixed_corpus_invariants() {
    let titles = FINANCE
        .iter()
        .chain(FOOTBALL.iter())
        .chain(WEATHER.iter())
        .copied()
        .collect::<Vec<&str>>();
    let items = store::parse_items(&as_jsonl(&titles)).unwrap();
    assert_eq!(items.len(), 18);

    let mut settings = Settings::default();
    settings.clustering.hdbscan.min_cluster_size = 3;
    settings.analysis.top_narratives = 2;
    let report = analyze(settings, &items);

    assert_eq!(report.total_news, 18);
    assert!(report.narratives_count <= 2);
    assert_eq!(report.narratives_count, report.narratives.len());
    assert!(
        report
            .narratives
            .windows(2)
            .all(|pair| pair[0].size >= pair[1].size)
    );
    let clustered = report.total_news - report.n_noise;
    assert!(report.narratives.iter().map(|n| n.size).sum::<usize>() <= clustered);
    for narrative in &report.narratives {
        assert!(
            narrative
                .keywords
                .iter()
                .all(|k| (3..=50).contains(&k.chars().count()))
        );
        assert!(narrative.representative_examples.len() <= narrative.size);
        assert!(
            narrative
                .representative_examples
                .iter()
                .all(|e| e.source == "Лента" || e.source == UNKNOWN_SOURCE)
        );
    }

    let quality = report.quality.as_ref().unwrap();
    assert_eq!(quality.total_samples, 18);
    assert!((0.0..=1.0).contains(&quality.overall_quality_score));
}

const TWO_TOPICS: [&str; 8] = [
    "Центробанк повысил ключевую ставку",
    "Ключевую ставку центробанк повысил снова",
    "Центробанк снова повысил ставку",
    "Повысил центробанк ключевую ставку",
    "Футбольный клуб выиграл кубок страны",
    "Кубок страны выиграл футбольный клуб",
    "Футбольный клуб снова выиграл кубок",
    "Выиграл кубок страны футбольный клуб",
];

fn two_topic_report() -> AnalysisReport {
    let items = store::parse_items(&as_jsonl(&TWO_TOPICS)).unwrap();
    let mut settings = Settings::default();
    settings.clustering.hdbscan.min_cluster_size = 2;
    settings.vectorization.min_df = 1;
    analyze(settings, &items)
}

#[test]
fn two_separated_topics() {
    let report = two_topic_report();

    assert_eq!(report.n_clusters, 2);
    assert_eq!(report.n_noise, 0);
    assert_eq!(report.narratives.len(), 2);
    assert!(report.narratives.iter().all(|n| n.size == 4 && n.news_count == 4));

    let finance = report
        .narratives
        .iter()
        .find(|n| n.representative_examples[0].title == TWO_TOPICS[0])
        .unwrap();
    assert!(finance.keywords.contains(&"центробанк".to_owned()));
    assert_eq!(finance.representative_examples[1].source, UNKNOWN_SOURCE);

    let summary = Summary(&report).to_string();
    assert!(summary.contains("Topics found: 2"));
    assert!(summary.contains("TOPIC #2 (news: 4)"));
}

#[test]
fn near_identical_items_need_single_cluster_permission() {
    let titles = [
        "Центробанк повысил ключевую ставку сегодня",
        "Центробанк повысил ключевую ставку утром",
        "Центробанк повысил ключевую ставку вечером",
        "Центробанк повысил ключевую ставку снова",
        "Центробанк повысил ключевую ставку",
    ];
    let items = titles.iter().map(|t| NewsItem::new(*t)).collect::<Vec<_>>();

    let report = analyze(Settings::default(), &items);
    assert_eq!(report.n_clusters, 0);
    assert_eq!(report.n_noise, 5);
    assert!(report.narratives.is_empty());

    let mut settings = Settings::default();
    settings.clustering.hdbscan.allow_single_cluster = true;
    let report = analyze(settings, &items);
    assert_eq!(report.n_clusters, 1);
    assert_eq!(report.n_noise, 0);
    assert_eq!(report.narratives.len(), 1);
    assert_eq!(report.narratives[0].size, 5);
}

#[test]
fn too_few_items_are_all_noise() {
    let items = FINANCE[..3]
        .iter()
        .map(|t| NewsItem::new(*t))
        .collect::<Vec<_>>();
    let mut settings = Settings::default();
    settings.vectorization.min_df = 1;
    let report = analyze(settings, &items);
    assert_eq!(report.total_news, 3);
    assert_eq!(report.n_clusters, 0);
    assert_eq!(report.n_noise, 3);
    assert!(report.narratives.is_empty());
}

#[test]
fn titles_without_shared_terms_stay_noise() {
    let one_offs = [
        "Вулкан проснулся на Камчатке",
        "Пианист сыграл сонату Бетховена",
        "Астрономы заметили яркую комету",
        "Фермер вырастил гигантскую тыкву",
        "Программист написал компилятор",
    ];
    let items = TWO_TOPICS
        .iter()
        .chain(one_offs.iter())
        .map(|t| NewsItem::new(*t))
        .collect::<Vec<_>>();
    let mut settings = Settings::default();
    settings.clustering.hdbscan.min_cluster_size = 2;
    let report = analyze(settings, &items);

    assert_eq!(report.n_clusters, 2);
    assert_eq!(report.n_noise, one_offs.len());
    assert!(report.narratives.iter().all(|n| n.size == 4));
    assert!(report.narratives.iter().all(|n| {
        n.representative_examples
            .iter()
            .all(|e| !one_offs.contains(&e.title.as_str()))
    }));
}

#[test]
fn report_round_trips_through_disk() {
    let report = two_topic_report();
    assert_eq!(report.n_clusters, 2);
    assert!(report.quality.is_some());

    let dir = tempfile::tempdir().unwrap();
    let path = ReportWriter::new(dir.path(), "%Y-%m-%d").save(&report).unwrap();
    assert!(path.ends_with("report_2024-03-09.json"));
    let saved: AnalysisReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.total_news, report.total_news);
    assert_eq!(saved.narratives, report.narratives);
    let (saved_quality, quality) = (saved.quality.unwrap(), report.quality.unwrap());
    assert_eq!(saved_quality.size.size_distribution, quality.size.size_distribution);
    assert_eq!(saved_quality.quality_grade, quality.quality_grade);
}
