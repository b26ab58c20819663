//! End-to-end query behavior over the two-period, two-cell scenario.

use gridcast::{
    DuplicateKeyPolicy, EngineOptions, Error, ForecastEngine, ForecastQuery, ForecastRecord,
    JoinStrategy, MetricValue,
};
use gridcast_test_utils::{
    PrimaryRow, SecondaryRow, init_tracing_for_tests, primary_table, scenario_rows,
    secondary_table,
};

const STRATEGIES: [JoinStrategy; 2] = [JoinStrategy::Eager, JoinStrategy::Lazy];

fn scenario_engine(strategy: JoinStrategy) -> ForecastEngine {
    init_tracing_for_tests();
    let (primary, secondary) = scenario_rows();
    ForecastEngine::from_tables(
        primary_table(&primary, 3),
        secondary_table(&secondary, 2),
        EngineOptions::new().with_strategy(strategy),
    )
    .unwrap()
}

fn collect(engine: &ForecastEngine, query: &ForecastQuery) -> Vec<ForecastRecord> {
    let mut records = engine
        .query(query)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    records.sort_by_key(ForecastRecord::key);
    records
}

fn map(record: &ForecastRecord) -> Option<f64> {
    record.metrics.get("MAP").and_then(MetricValue::as_f64)
}

#[test]
fn map_for_every_key_of_the_scenario() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let query = ForecastQuery::new()
            .periods([409, 410])
            .cells([62356, 81761])
            .metrics(["MAP"]);
        let records = collect(&engine, &query);

        let keys: Vec<_> = records.iter().map(ForecastRecord::key).collect();
        assert_eq!(
            keys,
            vec![(409, 62356), (409, 81761), (410, 62356), (410, 81761)],
            "{strategy}"
        );
        assert_eq!(map(&records[0]), Some(1.0));
        assert_eq!(map(&records[1]), Some(5.0));
        assert_eq!(map(&records[2]), None, "all lists empty gives null");
        assert_eq!(map(&records[3]), Some(2.0));
        for record in &records {
            assert_eq!(record.metrics.names().collect::<Vec<_>>(), vec!["MAP"]);
        }
    }
}

#[test]
fn unmatched_rows_carry_null_secondary_metrics() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let query = ForecastQuery::new().metrics(["HDI_50_lower", "prob_threshold_6", "MAP"]);
        let records = collect(&engine, &query);
        assert_eq!(records.len(), 4);

        let matched = &records[1];
        assert_eq!(matched.key(), (409, 81761));
        assert_eq!(
            matched.metrics.get("HDI_50_lower"),
            Some(&MetricValue::Float32(100.0))
        );
        assert_eq!(
            matched.metrics.get("prob_threshold_6"),
            Some(&MetricValue::Float32(111.0))
        );

        let unmatched = &records[3];
        assert_eq!(unmatched.key(), (410, 81761));
        assert!(unmatched.metrics.contains("HDI_50_lower"));
        assert_eq!(unmatched.metrics.get("HDI_50_lower"), None);
        assert_eq!(unmatched.metrics.get("prob_threshold_6"), None);
        assert_eq!(map(unmatched), Some(2.0));
        assert_eq!(
            unmatched.metrics.names().collect::<Vec<_>>(),
            vec!["HDI_50_lower", "prob_threshold_6", "MAP"]
        );
    }
}

#[test]
fn omitted_metrics_select_the_whole_catalog() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let records = collect(&engine, &ForecastQuery::new());
        assert_eq!(records.len(), 4);
        let expected = engine.available_metrics();
        for record in &records {
            assert_eq!(record.metrics.names().collect::<Vec<_>>(), expected);
        }
        assert_eq!(records[0].region, Some(62356 % 7 + 1));
        assert_eq!(records[0].row, Some(62356 / 720));
    }
}

#[test]
fn empty_metric_list_selects_the_whole_catalog() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let query = ForecastQuery::new().metrics(Vec::<String>::new());
        let records = collect(&engine, &query);
        assert_eq!(records.len(), 4);
        let expected = engine.available_metrics();
        assert_eq!(expected.len(), 13);
        for record in &records {
            assert_eq!(record.metrics.names().collect::<Vec<_>>(), expected, "{strategy}");
        }
        assert_eq!(records, collect(&engine, &ForecastQuery::new()));
        assert_eq!(map(&records[3]), Some(2.0));
    }
}

#[test]
fn unknown_metric_fails_before_any_row() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let query = ForecastQuery::new().metrics([
            "MAP",
            "not_a_real_metric",
            "HDI_42",
            "not_a_real_metric",
        ]);
        match engine.query(&query) {
            Err(Error::ValidationError { invalid_metrics }) => {
                assert_eq!(invalid_metrics, vec!["not_a_real_metric", "HDI_42"]);
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("query with unknown metrics must fail"),
        }
    }
}

#[test]
fn filters_combine_as_a_conjunction() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);

        let by_period = collect(&engine, &ForecastQuery::new().periods([410]));
        assert_eq!(by_period.len(), 2);
        assert!(by_period.iter().all(|r| r.period_id == 410));

        let both = collect(&engine, &ForecastQuery::new().periods([410]).cells([62356]));
        assert_eq!(both.iter().map(ForecastRecord::key).collect::<Vec<_>>(), vec![(410, 62356)]);

        let region = 81761 % 7 + 1;
        let by_region = collect(&engine, &ForecastQuery::new().regions([region]));
        assert_eq!(by_region.len(), 2);
        assert!(by_region.iter().all(|r| r.cell_id == 81761));

        let disjoint = collect(&engine, &ForecastQuery::new().periods([409]).periods([411]));
        assert!(disjoint.is_empty(), "later allow-list replaces the earlier one");
    }
}

#[test]
fn empty_allow_list_matches_nothing() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        for query in [
            ForecastQuery::new().periods(Vec::new()),
            ForecastQuery::new().cells(Vec::new()).metrics(["MAP"]),
            ForecastQuery::new().regions(Vec::new()),
        ] {
            assert!(collect(&engine, &query).is_empty(), "{strategy}: {query:?}");
        }
    }
}

#[test]
fn region_without_rows_yields_an_empty_stream() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let query = ForecastQuery::new().regions([0]).metrics(["MAP"]);
        assert!(collect(&engine, &query).is_empty());
    }
}

#[test]
fn null_region_never_matches() {
    let primary = vec![
        PrimaryRow::new(409, 1, Default::default()).with_region(None),
        PrimaryRow::new(409, 2, Default::default()).with_region(Some(5)),
    ];
    let secondary = vec![SecondaryRow::sequential(409, 1, 0.0)];
    for strategy in STRATEGIES {
        let engine = ForecastEngine::from_tables(
            primary_table(&primary, 8),
            secondary_table(&secondary, 8),
            EngineOptions::new().with_strategy(strategy),
        )
        .unwrap();
        let records = collect(&engine, &ForecastQuery::new().regions([5]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cell_id, 2);
        assert_eq!(engine.distinct_regions().unwrap(), vec![5]);
    }
}

#[test]
fn dropping_a_stream_early_is_harmless() {
    for strategy in STRATEGIES {
        let engine = scenario_engine(strategy);
        let mut stream = engine.query(&ForecastQuery::new()).unwrap();
        assert!(stream.next().is_some());
        drop(stream);
        assert_eq!(collect(&engine, &ForecastQuery::new()).len(), 4);
    }
}

#[test]
fn duplicate_secondary_keys_follow_the_policy() {
    let primary = vec![PrimaryRow::new(409, 7, Default::default())];
    let secondary = vec![
        SecondaryRow::sequential(409, 7, 10.0),
        SecondaryRow::sequential(409, 7, 20.0),
    ];

    for strategy in STRATEGIES {
        let engine = ForecastEngine::from_tables(
            primary_table(&primary, 8),
            secondary_table(&secondary, 1),
            EngineOptions::new().with_strategy(strategy),
        )
        .unwrap();
        let records = collect(&engine, &ForecastQuery::new().metrics(["HDI_50_lower"]));
        assert_eq!(records.len(), 1, "primary rows are never duplicated");
        assert_eq!(
            records[0].metrics.get("HDI_50_lower"),
            Some(&MetricValue::Float32(10.0)),
            "first secondary row wins"
        );

        let rejected = ForecastEngine::from_tables(
            primary_table(&primary, 8),
            secondary_table(&secondary, 1),
            EngineOptions::new()
                .with_strategy(strategy)
                .with_duplicate_keys(DuplicateKeyPolicy::Reject),
        );
        assert!(matches!(rejected, Err(Error::LoadError(_))));
    }
}

#[test]
fn duplicate_primary_keys_fail_construction() {
    let primary = vec![
        PrimaryRow::new(409, 7, Default::default()),
        PrimaryRow::new(409, 7, Default::default()),
    ];
    let secondary = vec![SecondaryRow::sequential(409, 7, 0.0)];
    for strategy in STRATEGIES {
        let result = ForecastEngine::from_tables(
            primary_table(&primary, 1),
            secondary_table(&secondary, 1),
            EngineOptions::new().with_strategy(strategy),
        );
        assert!(matches!(result, Err(Error::LoadError(msg)) if msg.contains("duplicate key")));
    }
}

#[test]
fn raw_catalog_serves_source_columns() {
    let (primary, secondary) = scenario_rows();
    for strategy in STRATEGIES {
        let engine = ForecastEngine::from_tables(
            primary_table(&primary, 4),
            secondary_table(&secondary, 4),
            EngineOptions::new()
                .with_strategy(strategy)
                .with_catalog(gridcast::CatalogVersion::Raw),
        )
        .unwrap();
        assert_eq!(engine.catalog().version(), "raw-v1");
        let query = ForecastQuery::new()
            .periods([410])
            .cells([81761])
            .metrics(["pred_ln_sb_best", "pred_ln_os_best"]);
        let records = collect(&engine, &query);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].metrics.get("pred_ln_sb_best").and_then(MetricValue::as_list),
            Some(&[Some(1.0), Some(2.0)][..])
        );
        assert_eq!(
            records[0].metrics.get("pred_ln_os_best").and_then(MetricValue::as_list),
            Some(&[][..])
        );
        assert!(matches!(
            engine.query(&ForecastQuery::new().metrics(["MAP"])),
            Err(Error::ValidationError { .. })
        ));
    }
}

#[test]
fn custom_catalog_reads_only_its_sources() {
    use gridcast::{ColumnRef, MetricCatalog, MetricDef};

    let catalog = MetricCatalog::try_new(
        "custom-v1",
        vec![
            MetricDef::mean_of("sb_mean", vec![ColumnRef::primary("pred_ln_sb_best")]),
            MetricDef::float32(
                "sb_upper",
                ColumnRef::secondary("pred_ln_sb_best_hdi_upper"),
            ),
        ],
    )
    .unwrap();

    let (primary, secondary) = scenario_rows();
    for strategy in STRATEGIES {
        let engine = ForecastEngine::from_tables(
            primary_table(&primary, 4),
            secondary_table(&secondary, 4),
            EngineOptions::new()
                .with_strategy(strategy)
                .with_custom_catalog(catalog.clone()),
        )
        .unwrap();
        assert_eq!(engine.available_metrics(), vec!["sb_mean", "sb_upper"]);

        let records = collect(&engine, &ForecastQuery::new().periods([409]));
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].metrics.get("sb_mean").and_then(MetricValue::as_f64),
            Some(5.0)
        );
        assert_eq!(
            records[1].metrics.get("sb_upper"),
            Some(&MetricValue::Float32(101.0))
        );
        assert!(matches!(
            engine.query(&ForecastQuery::new().metrics(["MAP"])),
            Err(Error::ValidationError { .. })
        ));
    }
}
