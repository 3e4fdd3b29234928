//! End-to-end tests: report text in, reports and aggregate rows out.

use lorastats::analysis::{
    aggregate, best_of, parse_report, parse_reports, Diagnostic, Direction, FieldSource, GroupBy,
    GroupKey, ParseOptions, ReportSchema, Scalar, SectionName,
};
use lorastats::config::AnalysisConfig;

fn parse(id: &str, text: &str) -> lorastats::analysis::Report {
    parse_report(id, text, &ReportSchema::builtin(), &ParseOptions::default()).unwrap()
}

fn minimal(sf: i64, pdr: f64) -> String {
    format!(
        "CONFIGURATION\nSpreadingFactor,{}\nOVERALL_STATS\nPDR_Percent,{}\nPER_NODE_STATS\nNodeID,Sent,Received\n0,10,9\n",
        sf, pdr
    )
}

const SCENARIO_FILE: &str = "\
# Scenario 08: Multi-gateway coverage
# Generated: 2025-05-02 09:30:00
CONFIGURATION
NumberOfGateways,2
PacketInterval_s,600
PropagationModel,LogDistance, exp 3.76
OVERALL_STATS
TotalSent,200
TotalReceived,150
TotalRawHearings,240
DuplicatePackets,90
PER_NODE_STATS
NodeID,Sent,Received,Losses,InitSF_DR,InitTP_dBm,UniqueReceived
0,100,80,5,3,14,80
1,100,70,7,3,14,70
2,100,oops

PER_GATEWAY_STATS
GatewayID,RawHearings,LoadPercentage
0,140,58.3
1,100,41.7
INTERFERENCE_STATS
RxOk_Total,150
Lost_Interference_Total,12
";

#[test]
fn test_scenario_file() {
    let report = parse("out/2gw/scenario_08_results.csv", SCENARIO_FILE);

    assert_eq!(report.overall().number("PDR_percent"), Some(75.0));
    assert_eq!(report.table(SectionName::PerNodeStats).map(|t| t.len()), Some(2));
    assert_eq!(report.overall().integer("Dropped"), Some(50));
    assert_eq!(report.overall().number("DeduplicationRate_percent"), Some(37.5));
    assert_eq!(report.overall().integer("TotalCollisions"), Some(12));
    assert_eq!(report.overall().number("CollisionRate_percent"), Some(6.0));
    assert_eq!(report.overall().integer("NumberOfGateways"), Some(2));
    assert_eq!(report.overall().integer("NumberOfNodes"), Some(2));
    assert_eq!(
        report.config().get("PropagationModel"),
        Some(&Scalar::String("LogDistance, exp 3.76".into()))
    );

    let derived = report.derived();
    assert_eq!(derived.integer("initial_sf"), Some(9));
    assert_eq!(derived.number("initial_tp_dbm"), Some(14.0));
    assert_eq!(derived.number("coverage_percent"), Some(100.0));
    assert_eq!(derived.integer("total_hearings"), Some(240));
    assert_eq!(derived.integer("node_collision_sum"), Some(12));

    assert!(report
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::MalformedRow { found: 3, expected: 7, .. })));
    assert_eq!(
        derived.integer("_warnings"),
        Some(report.diagnostics().len() as i64)
    );
    assert_eq!(
        report.metadata().get("scenario_number").map(String::as_str),
        Some("8")
    );

    assert_eq!(GroupBy::GatewayCount.key(&report), GroupKey::Int(2));
    assert_eq!(GroupBy::PacketInterval.key(&report), GroupKey::Int(600));
}

#[test]
fn test_alias_only_file_resolves() {
    let report = parse(
        "alias",
        "OVERALL_STATS\nUL_Sent,50\nUL_Received,25\nPER_NODE_STATS\nNodeId,UL_Sent\n0,50\n",
    );
    assert_eq!(report.overall().integer("TotalSent"), Some(50));
    assert_eq!(report.overall().number("PDR_percent"), Some(50.0));
    assert_eq!(report.nodes()[0].integer("Sent"), Some(50));
    assert_eq!(report.nodes()[0].integer("NodeID"), Some(0));
}

#[test]
fn test_zero_sent_never_nan() {
    let report = parse(
        "idle",
        "OVERALL_STATS\nTotalSent,0\nTotalReceived,0\nPER_NODE_STATS\nNodeID,Sent,Received\n0,0,0\n",
    );
    for rate in ["PDR_percent", "DropRate_percent", "CollisionRate_percent", "UniquePDR_percent"] {
        assert_eq!(report.overall().number(rate), Some(0.0), "{rate}");
    }
    assert_eq!(report.nodes()[0].number("PDR_percent"), Some(0.0));
    assert_eq!(report.derived().number("coverage_percent"), Some(0.0));
}

#[test]
fn test_aggregate_by_sf_and_best() {
    let inputs: Vec<(String, String)> = vec![
        ("b/sf7_results.csv".into(), minimal(7, 95.0)),
        ("a/sf7_results.csv".into(), minimal(7, 90.0)),
        ("c/sf9_results.csv".into(), minimal(9, 92.5)),
        ("d/broken_results.csv".into(), "CONFIGURATION\nSpreadingFactor,8\n".into()),
    ];
    let batch = parse_reports(&inputs, &ReportSchema::builtin(), &ParseOptions::default());
    assert_eq!(batch.reports.len(), 3);
    assert_eq!(batch.failures.len(), 1);

    let rows = aggregate(&batch.reports, |r| GroupBy::SpreadingFactor.key(r));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, GroupKey::Int(7));
    assert_eq!(rows[0].mean("PDR_percent"), Some(92.5));
    assert_eq!(rows[0].sources, vec!["a/sf7_results.csv", "b/sf7_results.csv"]);

    // 7 and 9 tie on mean PDR
    let best = best_of(&rows, "PDR_percent", Direction::Highest).unwrap();
    assert_eq!(best.key, GroupKey::Int(7));

    let mut reversed = batch.reports.clone();
    reversed.reverse();
    let again = aggregate(&reversed, |r| GroupBy::SpreadingFactor.key(r));
    assert_eq!(rows, again);
}

#[test]
fn test_config_driven_schema() {
    let yaml = "\
required_sections: [OVERALL_STATS]
unknown_fields: drop
extra_aliases:
  OVERALL_STATS:
    TotalSent: [Uplinks]
";
    let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();

    let report = parse_report(
        "cfg",
        "OVERALL_STATS\nUplinks,40\nTotalReceived,10\nBogus,1\n",
        &config.schema(),
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(report.overall().integer("TotalSent"), Some(40));
    assert_eq!(report.overall().number("PDR_percent"), Some(25.0));
    assert!(!report.overall().contains_key("Bogus"));
    assert!(report.nodes().is_empty());
}

#[test]
fn test_extreme_counts_do_not_abort_batch() {
    let inputs: Vec<(String, String)> = vec![
        (
            "huge_results.csv".into(),
            "OVERALL_STATS\nTotalSent,9223372036854775807\nTotalReceived,-1\nPER_NODE_STATS\nNodeID,Sent,InitSF_DR\n0,9223372036854775807,-9223372036854775808\n1,1,0\n".into(),
        ),
        ("sf7_results.csv".into(), minimal(7, 90.0)),
    ];
    let batch = parse_reports(&inputs, &ReportSchema::builtin(), &ParseOptions::default());
    assert!(batch.failures.is_empty());
    assert_eq!(batch.reports.len(), 2);

    let huge = &batch.reports[0];
    assert_eq!(huge.source_id(), "huge_results.csv");
    assert!(huge.overall().scalar("Dropped").is_none());
    assert!(huge.derived().scalar("node_sent_sum").is_none());
    assert!(huge.derived().scalar("initial_sf").is_none());
}
