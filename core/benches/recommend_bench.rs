use criterion::{criterion_group, criterion_main, Criterion};
use materials_core::{MaterialRecord, Recommender, RecommenderConfig};

fn synthetic_catalog(n: u32) -> Vec<MaterialRecord> {
    let words = ["steel", "concrete", "timber", "scaffold", "crane", "diesel", "panel", "mixer", "ladder", "fence"];
    (0..n)
        .map(|i| MaterialRecord {
            id: i,
            name: format!("{} {}", words[i as usize % 10], words[(i as usize * 7) % 10]),
            category: words[(i as usize * 3) % 10].to_string(),
            description: words.iter().cycle().skip(i as usize).take(12).copied().collect::<Vec<_>>().join(" "),
            specifications: format!("Capacity: {} tons", i % 50),
            unit: "unit".into(),
            price_per_day: 10.0,
            quantity_available: 100,
        })
        .collect()
}

fn bench_recommend(c: &mut Criterion) {
    let catalog = synthetic_catalog(2_000);
    c.bench_function("fit_2000", |b| b.iter(|| Recommender::fit(catalog.clone(), RecommenderConfig::default())));
    let rec = Recommender::fit(catalog, RecommenderConfig::default());
    c.bench_function("recommend_by_project", |b| b.iter(|| rec.recommend_by_project("concrete foundation with steel", Some("residential"), 5)));
}

criterion_group!(benches, bench_recommend);
criterion_main!(benches);
