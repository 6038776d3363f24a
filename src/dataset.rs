use crate::errors::AppError;
use indexmap::IndexMap;
use serde_json::Value;

/// One decoded dimension of a statistical table: code order and labels.
#[derive(Debug, Clone)]
pub struct Dimension {
    /// Human-readable dimension name, when the source provides one.
    pub label: Option<String>,
    /// Value codes in source position order.
    pub codes: Vec<String>,
    /// Code -> human-readable label, insertion order preserved.
    pub labels: IndexMap<String, String>,
}

/// The dimension tree of one response, in source order.
#[derive(Debug, Clone, Default)]
pub struct Dimensions {
    entries: IndexMap<String, Dimension>,
}

impl Dimensions {
    pub fn get(&self, dimension: &str) -> Option<&Dimension> {
        self.entries.get(dimension)
    }

    /// Resolves the human label for a code of a dimension.
    pub fn label(&self, dimension: &str, code: &str) -> Result<&str, AppError> {
        self.entries
            .get(dimension)
            .and_then(|d| d.labels.get(code))
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::MissingData(format!("no label for {} in dimension {}", code, dimension))
            })
    }

    /// All code -> label pairs of one dimension, in source order.
    pub fn labels(&self, dimension: &str) -> Result<&IndexMap<String, String>, AppError> {
        self.entries
            .get(dimension)
            .map(|d| &d.labels)
            .ok_or_else(|| AppError::MissingData(format!("no dimension {}", dimension)))
    }

    /// Serializes the tree back to JSON in source order.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (name, dim) in &self.entries {
            let mut category = serde_json::Map::new();
            let index: serde_json::Map<String, Value> = dim
                .codes
                .iter()
                .enumerate()
                .map(|(i, code)| (code.clone(), Value::from(i)))
                .collect();
            category.insert("index".to_string(), Value::Object(index));
            let labels: serde_json::Map<String, Value> = dim
                .labels
                .iter()
                .map(|(code, label)| (code.clone(), Value::from(label.clone())))
                .collect();
            category.insert("label".to_string(), Value::Object(labels));

            let mut entry = serde_json::Map::new();
            if let Some(ref label) = dim.label {
                entry.insert("label".to_string(), Value::from(label.clone()));
            }
            entry.insert("category".to_string(), Value::Object(category));
            out.insert(name.clone(), Value::Object(entry));
        }
        Value::Object(out)
    }
}

/// One row of a decoded table: dimension codes plus the observed count.
///
/// Population rows carry no cause.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub region: String,
    pub cause: Option<String>,
    pub age: String,
    pub sex: String,
    pub year: String,
    /// Death or population count; `None` when the source reports no value.
    pub value: Option<f64>,
}

/// Flat long-format table decoded from one response.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    pub rows: Vec<Observation>,
}

impl ObservationTable {
    /// Rewrites the age column from the population vocabulary into the
    /// mortality vocabulary.
    ///
    /// A population band mapping to two mortality bands duplicates the row,
    /// both copies sharing the undifferentiated count.
    pub fn realign_ages(&mut self, merge_table: &IndexMap<String, Vec<String>>) {
        let mut realigned = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            match merge_table.get(&row.age) {
                Some(targets) => {
                    for target in targets {
                        let mut copy = row.clone();
                        copy.age = target.clone();
                        realigned.push(copy);
                    }
                }
                // Band outside the merge vocabulary passes through untouched.
                None => realigned.push(row),
            }
        }
        self.rows = realigned;
    }

    /// Smallest and largest year code present, for plot titles.
    pub fn year_span(&self) -> Option<(String, String)> {
        let min = self.rows.iter().map(|r| r.year.as_str()).min()?;
        let max = self.rows.iter().map(|r| r.year.as_str()).max()?;
        Some((min.to_string(), max.to_string()))
    }
}

/// Dimension tree plus decoded table for one query.
#[derive(Debug, Clone)]
pub struct DatasetResult {
    pub dimensions: Dimensions,
    pub table: ObservationTable,
}

fn missing(what: &str) -> AppError {
    AppError::MissingData(format!("response missing {}", what))
}

fn decode_dimension(name: &str, entry: &Value) -> Result<Dimension, AppError> {
    let category = entry
        .get("category")
        .ok_or_else(|| missing(&format!("dimension {} category", name)))?;

    // `index` is either code -> position or a code array; a single-valued
    // dimension may omit it and carry only `label`.
    let mut codes: Vec<String> = match category.get("index") {
        Some(Value::Object(map)) => {
            let mut positioned: Vec<(usize, String)> = map
                .iter()
                .map(|(code, pos)| {
                    let pos = pos.as_u64().ok_or_else(|| {
                        missing(&format!("numeric index for {} in {}", code, name))
                    })?;
                    Ok((pos as usize, code.clone()))
                })
                .collect::<Result<_, AppError>>()?;
            positioned.sort_by_key(|(pos, _)| *pos);
            positioned.into_iter().map(|(_, code)| code).collect()
        }
        Some(Value::Array(arr)) => arr
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| missing(&format!("string code in {} index", name)))
            })
            .collect::<Result<_, AppError>>()?,
        _ => Vec::new(),
    };

    let mut labels = IndexMap::new();
    if let Some(Value::Object(map)) = category.get("label") {
        if codes.is_empty() {
            codes = map.keys().cloned().collect();
        }
        for (code, label) in map {
            labels.insert(
                code.clone(),
                label.as_str().unwrap_or_default().to_string(),
            );
        }
    }
    if codes.is_empty() {
        return Err(missing(&format!("codes for dimension {}", name)));
    }
    // Codes without a label display as themselves.
    for code in &codes {
        labels.entry(code.clone()).or_insert_with(|| code.clone());
    }

    Ok(Dimension {
        label: entry.get("label").and_then(Value::as_str).map(str::to_string),
        codes,
        labels,
    })
}

/// Decodes a json-stat dataset document into its dimension tree and flat
/// observation table.
///
/// The value array is row-major over the dimension order given by
/// `dimension.id`/`dimension.size`, last dimension varying fastest.
pub fn decode_dataset(body: &Value) -> Result<DatasetResult, AppError> {
    let dataset = body.get("dataset").ok_or_else(|| missing("dataset"))?;
    let dimension = dataset.get("dimension").ok_or_else(|| missing("dataset.dimension"))?;

    let ids: Vec<String> = dimension
        .get("id")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("dimension.id"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| missing("string dimension id"))
        })
        .collect::<Result<_, AppError>>()?;
    let sizes: Vec<usize> = dimension
        .get("size")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("dimension.size"))?
        .iter()
        .map(|v| {
            v.as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| missing("numeric dimension size"))
        })
        .collect::<Result<_, AppError>>()?;
    if ids.len() != sizes.len() {
        return Err(AppError::MissingData(format!(
            "dimension id/size mismatch: {} vs {}",
            ids.len(),
            sizes.len()
        )));
    }

    let mut entries = IndexMap::new();
    for id in &ids {
        let entry = dimension
            .get(id)
            .ok_or_else(|| missing(&format!("dimension {}", id)))?;
        entries.insert(id.clone(), decode_dimension(id, entry)?);
    }
    let dimensions = Dimensions { entries };

    for (id, size) in ids.iter().zip(&sizes) {
        let n = dimensions.entries[id].codes.len();
        if n != *size {
            return Err(AppError::MissingData(format!(
                "dimension {} has {} codes but size {}",
                id, n, size
            )));
        }
    }

    let values = dataset.get("value").ok_or_else(|| missing("dataset.value"))?;
    let total: usize = sizes.iter().product();
    let value_at = |i: usize| -> Option<f64> {
        match values {
            Value::Array(arr) => arr.get(i).and_then(Value::as_f64),
            // Sparse form: an object keyed by linear index.
            Value::Object(map) => map.get(&i.to_string()).and_then(Value::as_f64),
            _ => None,
        }
    };

    let mut rows = Vec::with_capacity(total);
    for i in 0..total {
        let mut region = None;
        let mut cause = None;
        let mut age = None;
        let mut sex = None;
        let mut year = None;

        // Mixed-radix expansion of the linear index, last dimension fastest.
        let mut remainder = i;
        for (dim_pos, id) in ids.iter().enumerate().rev() {
            let size = sizes[dim_pos];
            let code = &dimensions.entries[id].codes[remainder % size];
            remainder /= size;
            match id.as_str() {
                "Region" => region = Some(code.clone()),
                "Dodsorsak" => cause = Some(code.clone()),
                "Alder" => age = Some(code.clone()),
                "Kon" => sex = Some(code.clone()),
                "Tid" => year = Some(code.clone()),
                // ContentsCode is single-valued and carried by the query.
                _ => {}
            }
        }

        rows.push(Observation {
            region: region.ok_or_else(|| missing("Region dimension"))?,
            cause,
            age: age.ok_or_else(|| missing("Alder dimension"))?,
            sex: sex.ok_or_else(|| missing("Kon dimension"))?,
            year: year.ok_or_else(|| missing("Tid dimension"))?,
            value: value_at(i),
        });
    }

    Ok(DatasetResult {
        dimensions,
        table: ObservationTable { rows },
    })
}
