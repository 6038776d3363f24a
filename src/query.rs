use crate::errors::AppError;
use crate::regions::{classify, RegionLevel};
use serde::Serialize;

/// Content code selecting the population-count indicator.
pub const POPULATION_CONTENT_CODE: &str = "BE0101N1";

/// Requested response format; the decode layer understands json-stat only.
const RESPONSE_FORMAT: &str = "json-stat";

/// Default year span of the mortality table.
pub fn year_range(start: u16, end: u16) -> Vec<String> {
    (start..=end).map(|y| y.to_string()).collect()
}

/// One selection clause of a table query.
///
/// Field and key order match the service's wire contract exactly.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryClause {
    pub selection: Selection,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Selection {
    pub filter: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponseSpec {
    pub format: String,
}

/// A complete query document for either table endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryBody {
    pub response: ResponseSpec,
    pub query: Vec<QueryClause>,
}

/// How the cause list selects from the cause taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CauseFilterKind {
    /// An aggregate chapter code (contains a separator), e.g. "A-B".
    Chapter,
    /// A leaf code or the total sentinel, e.g. "TOT".
    Leaf,
}

impl CauseFilterKind {
    fn of(cause: &str) -> Self {
        if cause.contains('-') {
            CauseFilterKind::Chapter
        } else {
            CauseFilterKind::Leaf
        }
    }

    fn filter_key(self) -> &'static str {
        match self {
            CauseFilterKind::Chapter => "agg:DödsorsakKapitel",
            CauseFilterKind::Leaf => "item",
        }
    }
}

/// Determines the single administrative level of a region list.
///
/// Mixed-level lists would silently select the wrong filter key upstream,
/// so they are rejected here instead.
fn region_level(regions: &[String]) -> Result<RegionLevel, AppError> {
    let first = regions
        .first()
        .ok_or_else(|| AppError::BadRequest("empty region list".to_string()))?;
    let level = classify(first)
        .ok_or_else(|| AppError::BadRequest(format!("unclassifiable region code: {}", first)))?;
    for region in &regions[1..] {
        if classify(region) != Some(level) {
            return Err(AppError::BadRequest(format!(
                "mixed-level region list: {} and {}",
                first, region
            )));
        }
    }
    Ok(level)
}

fn item_clause(code: &str, values: &[String]) -> QueryClause {
    QueryClause {
        selection: Selection {
            filter: "item".to_string(),
            values: values.to_vec(),
        },
        code: code.to_string(),
    }
}

/// Builds the deaths-by-cause query.
///
/// Clause order (Region, Dodsorsak, Alder, Kon, Tid) is part of the
/// external contract.
///
/// # Arguments
///
/// * `regions` - Region codes, all county-level or all municipality-level.
/// * `causes` - Cause codes; the first decides chapter vs. leaf filtering.
/// * `ages` - Mortality-vocabulary age bands.
/// * `sexes` - Sex codes ("1" men, "2" women).
/// * `years` - Year codes as strings.
pub fn deaths_query(
    regions: &[String],
    causes: &[String],
    ages: &[String],
    sexes: &[String],
    years: &[String],
) -> Result<QueryBody, AppError> {
    let region_filter = match region_level(regions)? {
        RegionLevel::County => "vs:RegionLän",
        RegionLevel::Municipality => "vs:RegionKommun95",
    };
    let cause = causes
        .first()
        .ok_or_else(|| AppError::BadRequest("empty cause list".to_string()))?;
    let cause_filter = CauseFilterKind::of(cause).filter_key();

    Ok(QueryBody {
        response: ResponseSpec {
            format: RESPONSE_FORMAT.to_string(),
        },
        query: vec![
            QueryClause {
                selection: Selection {
                    filter: region_filter.to_string(),
                    values: regions.to_vec(),
                },
                code: "Region".to_string(),
            },
            QueryClause {
                selection: Selection {
                    filter: cause_filter.to_string(),
                    values: causes.to_vec(),
                },
                code: "Dodsorsak".to_string(),
            },
            item_clause("Alder", ages),
            item_clause("Kon", sexes),
            item_clause("Tid", years),
        ],
    })
}

/// Builds the population-by-demographics query.
///
/// Uses the population table's own region filter vocabulary and adds the
/// fixed population-count content-code clause. Clause order (Region, Alder,
/// Kon, ContentsCode, Tid) is part of the external contract.
pub fn population_query(
    regions: &[String],
    ages: &[String],
    sexes: &[String],
    years: &[String],
) -> Result<QueryBody, AppError> {
    let region_filter = match region_level(regions)? {
        RegionLevel::County => "vs:RegionLän07",
        RegionLevel::Municipality => "vs:RegionKommun07",
    };

    Ok(QueryBody {
        response: ResponseSpec {
            format: RESPONSE_FORMAT.to_string(),
        },
        query: vec![
            QueryClause {
                selection: Selection {
                    filter: region_filter.to_string(),
                    values: regions.to_vec(),
                },
                code: "Region".to_string(),
            },
            item_clause("Alder", ages),
            item_clause("Kon", sexes),
            item_clause(
                "ContentsCode",
                &[POPULATION_CONTENT_CODE.to_string()],
            ),
            item_clause("Tid", years),
        ],
    })
}
