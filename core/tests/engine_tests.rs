use materials_core::persist::{load_catalog, save_catalog, CatalogPaths};
use materials_core::lease::open_lease;
use materials_core::{LeaseStatus, MaterialRecord, NewLease, NewLeaseItem, Recommender, RecommenderConfig};
use tempfile::tempdir;

fn material(id: u32, name: &str, category: &str, description: &str, specifications: &str, price: f64) -> MaterialRecord {
    MaterialRecord {
        id,
        name: name.into(),
        category: category.into(),
        description: description.into(),
        specifications: specifications.into(),
        unit: "unit".into(),
        price_per_day: price,
        quantity_available: 10,
    }
}

fn sample_catalog() -> Vec<MaterialRecord> {
    vec![
        material(1, "Concrete Formwork Panels", "Formwork",
            "High-quality plywood formwork panels for concrete casting. Reusable and durable.",
            "Size: 4x8 ft, Thickness: 18mm, Material: Marine plywood", 2.50),
        material(2, "Steel Scaffolding System", "Scaffolding",
            "Modular steel scaffolding system for construction sites. Easy assembly.",
            "Height: up to 50ft, Load capacity: 2000 lbs, Material: Galvanized steel", 15.00),
        material(3, "Construction Crane (Mobile)", "Heavy Equipment",
            "Mobile construction crane for lifting heavy materials and equipment.",
            "Capacity: 20 tons, Reach: 100ft, Operator included", 500.00),
        material(4, "Portable Generator", "Power Equipment",
            "Diesel-powered portable generator for construction site power needs.",
            "Power: 50kW, Fuel: Diesel, Runtime: 12 hours per tank", 75.00),
        material(5, "Cement Mixer (Industrial)", "Concrete Equipment",
            "Industrial cement mixer for large-scale concrete preparation.",
            "Capacity: 500 liters, Power: Electric/Diesel, Output: 25 cubic meters/hour", 85.00),
        material(6, "Excavator (Mini)", "Heavy Equipment",
            "Mini excavator for digging, trenching, and site preparation.",
            "Weight: 5 tons, Dig depth: 10ft, Bucket capacity: 0.5 cubic yards", 350.00),
    ]
}

#[test]
fn empty_catalog_yields_empty_results() {
    let rec = Recommender::fit(Vec::new(), RecommenderConfig::default());
    assert!(rec.score("concrete").is_empty());
    assert!(rec.recommend_by_project("concrete foundation", Some("Residential"), 5).is_empty());
    assert!(rec.recommend_complementary(&[1, 2], 5).is_empty());
}

#[test]
fn project_results_are_bounded_sorted_and_nonzero() {
    let rec = Recommender::fit(sample_catalog(), RecommenderConfig::default());
    for top_n in [1, 3, 10] {
        let hits = rec.recommend_by_project("Building a residential house with concrete foundation", Some("Residential Construction"), top_n);
        assert!(!hits.is_empty());
        assert!(hits.len() <= top_n);
        assert!(hits.iter().all(|c| c.score > 0.0 && c.score <= 1.0));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn refitting_identical_input_is_idempotent() {
    let a = Recommender::fit(sample_catalog(), RecommenderConfig::default());
    let b = Recommender::fit(sample_catalog(), RecommenderConfig::default());
    assert_eq!(a.score("heavy lifting crane"), b.score("heavy lifting crane"));
}

#[test]
fn disjoint_category_gets_diversity_bonus() {
    let rec = Recommender::fit(sample_catalog(), RecommenderConfig::default());
    let hits = rec.recommend_complementary(&[3], 10);
    assert_eq!(hits.len(), 5);
    let vectors = &rec.index().vectors;
    let crane = &vectors[2];
    // the other heavy-equipment item only gets the same-category score
    let excavator = hits.iter().find(|c| c.material.id == 6).unwrap();
    let expected = (0.2 + vectors[5].cosine(crane)) / 2.0;
    assert!((excavator.score - expected).abs() < 1e-6);
    for (pos, id) in [(0usize, 1u32), (1, 2), (3, 4), (4, 5)] {
        let hit = hits.iter().find(|c| c.material.id == id).unwrap();
        let expected = (0.5 + vectors[pos].cosine(crane)) / 2.0;
        assert!((hit.score - expected).abs() < 1e-6);
    }
}

#[test]
fn end_to_end_pricing_quote() {
    let materials = vec![
        material(1, "Concrete Formwork Panels", "Formwork", "", "", 2.50),
        material(2, "Steel Scaffolding System", "Scaffolding", "", "", 15.00),
    ];
    let rec = Recommender::fit(materials, RecommenderConfig::default());
    let q = rec.optimize_pricing(1, 90, 100).unwrap();
    assert_eq!(q.total_discount_percent, 30.0);
    assert_eq!(q.discounted_price_per_day, 1.75);
    assert_eq!(q.total_cost, 15750.0);
    assert_eq!(q.savings, 6750.0);
    assert!(rec.optimize_pricing(3, 90, 100).is_none());
}

#[test]
fn catalog_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let paths = CatalogPaths::new(dir.path().join("catalog"));
    let empty = load_catalog(&paths).unwrap();
    assert!(empty.materials.is_empty() && empty.leases.is_empty() && empty.meta.is_none());

    let mut materials = sample_catalog();
    let request = NewLease {
        user_id: 4,
        project_name: "Parking deck".into(),
        project_description: None,
        start_date: time::macros::date!(2024 - 05 - 01),
        end_date: time::macros::date!(2024 - 05 - 03),
        delivery_address: None,
        items: vec![NewLeaseItem { material_id: 1, quantity: 4 }],
    };
    let lease = open_lease(&[], request, &mut materials).unwrap();
    assert_eq!(lease.total_cost, 2.5 * 4.0 * 3.0);

    save_catalog(&paths, &materials, std::slice::from_ref(&lease)).unwrap();
    let loaded = load_catalog(&paths).unwrap();
    assert_eq!(loaded.materials, materials);
    assert_eq!(loaded.materials[0].quantity_available, 6);
    assert_eq!(loaded.leases, vec![lease]);
    assert_eq!(loaded.leases[0].status, LeaseStatus::Pending);
    let meta = loaded.meta.unwrap();
    assert_eq!((meta.num_materials, meta.num_leases), (6, 1));
}
