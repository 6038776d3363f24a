/// Integration tests with a mocked statistics service.
/// Exercise the fetch -> decode -> derive pipeline without hitting the real API.
use svmort::analysis::{ratio_series, Denominator, GroupBy, SeriesFilter};
use svmort::config::Config;
use svmort::regions::RegionLevel;
use svmort::scb_client::ScbClient;
use svmort::scenarios::{cause_vs_total_trend, TOTAL_CAUSE};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to point the client at a mock server.
fn test_config(base: &str) -> Config {
    Config {
        mortality_url: format!("{}/deaths", base),
        population_url: format!("{}/population", base),
        ..Config::default()
    }
}

fn strs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// json-stat body: region 01, one cause, age 0, both sexes, 1970-1971.
fn deaths_body(cause: &str, values: [f64; 4]) -> serde_json::Value {
    serde_json::json!({
        "dataset": {
            "dimension": {
                "Region": {"category": {"index": {"01": 0},
                                        "label": {"01": "01 Stockholms län"}}},
                "Dodsorsak": {"category": {"index": {(cause): 0},
                                           "label": {(cause): format!("orsak {}", cause)}}},
                "Alder": {"category": {"index": {"0": 0}}},
                "Kon": {"category": {"index": {"1": 0, "2": 1},
                                     "label": {"1": "män", "2": "kvinnor"}}},
                "Tid": {"category": {"index": {"1970": 0, "1971": 1}}},
                "id": ["Region", "Dodsorsak", "Alder", "Kon", "Tid"],
                "size": [1, 1, 1, 2, 2]
            },
            "value": values
        }
    })
}

#[tokio::test]
async fn deaths_fetch_decodes_table_and_labels() {
    svmort::obs::init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deaths"))
        .and(body_string_contains("vs:RegionLän"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deaths_body("TOT", [
            20.0, 40.0, 10.0, 30.0,
        ])))
        .mount(&mock_server)
        .await;

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let result = client
        .fetch_deaths(
            &strs(&["01"]),
            &strs(&["TOT"]),
            &strs(&["0"]),
            &strs(&["1", "2"]),
            &strs(&["1970", "1971"]),
        )
        .await
        .unwrap();

    assert_eq!(result.table.rows.len(), 4);
    let first = &result.table.rows[0];
    assert_eq!(first.region, "01");
    assert_eq!(first.cause.as_deref(), Some("TOT"));
    assert_eq!(first.sex, "1");
    assert_eq!(first.year, "1970");
    assert_eq!(first.value, Some(20.0));
    assert_eq!(
        result.dimensions.label("Region", "01").unwrap(),
        "01 Stockholms län"
    );
}

#[tokio::test]
async fn non_success_status_is_a_hard_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deaths"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let result = client
        .fetch_deaths(
            &strs(&["01"]),
            &strs(&["TOT"]),
            &strs(&["0"]),
            &strs(&["1"]),
            &strs(&["1970"]),
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn population_fetch_realigns_age_bands() {
    let mock_server = MockServer::start().await;

    // Population table: ages -4 and 85+, one sex, one year.
    let body = serde_json::json!({
        "dataset": {
            "dimension": {
                "Region": {"category": {"index": {"01": 0}}},
                "Alder": {"category": {"index": {"-4": 0, "85+": 1}}},
                "Kon": {"category": {"index": {"2": 0}}},
                "ContentsCode": {"category": {"index": {"BE0101N1": 0},
                                              "label": {"BE0101N1": "Folkmängd"}}},
                "Tid": {"category": {"index": {"1990": 0}}},
                "id": ["Region", "Alder", "Kon", "ContentsCode", "Tid"],
                "size": [1, 2, 1, 1, 1]
            },
            "value": [60_000.0, 9_000.0]
        }
    });

    Mock::given(method("POST"))
        .and(path("/population"))
        .and(body_string_contains("vs:RegionLän07"))
        .and(body_string_contains("BE0101N1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let result = client
        .fetch_population(
            &strs(&["01"]),
            &strs(&["-4", "85+"]),
            &strs(&["2"]),
            &strs(&["1990"]),
        )
        .await
        .unwrap();

    // Each coarse band splits into the two mortality bands it covers,
    // both copies carrying the undifferentiated count.
    let ages: Vec<(&str, Option<f64>)> = result
        .table
        .rows
        .iter()
        .map(|r| (r.age.as_str(), r.value))
        .collect();
    assert_eq!(
        ages,
        vec![
            ("0", Some(60_000.0)),
            ("1-4", Some(60_000.0)),
            ("85-89", Some(9_000.0)),
            ("90+", Some(9_000.0)),
        ]
    );
    assert!(result.table.rows.iter().all(|r| r.cause.is_none()));
}

#[tokio::test]
async fn metadata_fetch_supports_region_catalog_queries() {
    let mock_server = MockServer::start().await;

    let catalog = serde_json::json!({
        "title": "Döda efter region, dödsorsak, ålder och kön",
        "variables": [
            {"code": "Region", "text": "region",
             "values": ["00", "01", "0114", "0180", "03"],
             "valueTexts": ["Riket", "Stockholms län", "Upplands Väsby",
                            "Stockholm", "Uppsala län"]},
            {"code": "Dodsorsak", "text": "dödsorsak",
             "values": ["TOT"], "valueTexts": ["Alla dödsorsaker"]}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/deaths"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&catalog))
        .mount(&mock_server)
        .await;

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let metadata = client.mortality_metadata().await.unwrap();

    assert_eq!(
        metadata.regions_at_level(RegionLevel::County).unwrap(),
        vec!["01", "03"]
    );
    assert_eq!(
        metadata.municipalities_in_county("01").unwrap(),
        vec!["0114", "0180"]
    );
}

#[tokio::test]
async fn trend_scenario_fetches_both_tables_and_derives_ratios() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deaths"))
        .and(body_string_contains("\"A\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(deaths_body("A", [
            2.0, 4.0, 1.0, 3.0,
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deaths"))
        .and(body_string_contains("\"TOT\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(deaths_body("TOT", [
            20.0, 40.0, 10.0, 30.0,
        ])))
        .mount(&mock_server)
        .await;

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let bundle = cause_vs_total_trend(&client, "01", "A").await.unwrap();

    assert_eq!(bundle.numerator_cause, "A");
    assert_eq!(
        bundle.denominator_kind,
        Denominator::Cause(TOTAL_CAUSE.to_string())
    );
    assert_eq!(bundle.region.as_deref(), Some("01"));
    assert_eq!(bundle.region_labels().unwrap()["01"], "01 Stockholms län");

    let filter = SeriesFilter {
        sex: "1".to_string(),
        region: Some("01".to_string()),
        ages: vec!["0".to_string()],
        years: None,
    };
    let series = ratio_series(
        &bundle.numerator.table,
        &bundle.numerator_cause,
        &bundle.denominator.table,
        &bundle.denominator_kind,
        &filter,
        GroupBy::Year,
    );
    assert!((series["1970"] - 0.1).abs() < 1e-12);
    assert!((series["1971"] - 0.1).abs() < 1e-12);
}

#[tokio::test]
async fn mixed_level_region_list_never_reaches_the_wire() {
    let mock_server = MockServer::start().await;
    // No mocks mounted: a request would 404 and fail differently.

    let client = ScbClient::new(&test_config(&mock_server.uri())).unwrap();
    let err = client
        .fetch_deaths(
            &strs(&["01", "0180"]),
            &strs(&["TOT"]),
            &strs(&["0"]),
            &strs(&["1"]),
            &strs(&["1970"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, svmort::errors::AppError::BadRequest(_)));
}
