pub mod utils;
use crate::data::{Dataset, GeneSet, Template};
use crate::methods::gsea::RankListItem;
use crate::{Error, MalformedError, Result};
use ndarray::Array2;
use std::fs;
use std::path::Path;
use tracing::debug;
use utils::{line_of, parse_score, require_columns, split_labels, tsv_reader};

fn stem(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(fallback)
        .to_owned()
}

/// Reads a GMT file: one gene set per line as name, description, members.
pub fn read_gmt_file(path: impl AsRef<Path>) -> Result<Vec<GeneSet>> {
    let path = path.as_ref();
    let mut rdr = tsv_reader(path, false)?;
    let mut sets: Vec<GeneSet> = Vec::new();
    for (i, r) in rdr.records().enumerate() {
        let record = r?;
        let line = line_of(&record, i + 1);
        require_columns(&record, line, 3)?;
        let members = record
            .iter()
            .skip(2)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned)
            .collect();
        let mut set = GeneSet::new(record[0].trim(), members);
        let description = record[1].trim();
        if !description.is_empty() {
            set = set.with_description(description);
        }
        sets.push(set);
    }
    debug!("Read {} gene sets from {}", sets.len(), path.display());
    Ok(sets)
}

/// Reads a two column `.rnk` file of analyte and score.
pub fn read_rank_file(path: impl AsRef<Path>) -> Result<Vec<RankListItem>> {
    let path = path.as_ref();
    let mut rdr = tsv_reader(path, false)?;
    let mut items: Vec<RankListItem> = Vec::new();
    for (i, r) in rdr.records().enumerate() {
        let record = r?;
        let line = line_of(&record, i + 1);
        require_columns(&record, line, 2)?;
        items.push(RankListItem {
            analyte: record[0].trim().to_owned(),
            rank: parse_score(&record[1], line)?,
        });
    }
    debug!("Read {} ranked analytes from {}", items.len(), path.display());
    Ok(items)
}

/// Reads a tab-delimited expression matrix. The header row names the
/// samples after a leading feature column; every other row is a feature
/// followed by one value per sample.
pub fn read_expression_file(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let mut rdr = tsv_reader(path, false)?;
    let mut records = rdr.records().enumerate();
    let samples: Vec<String> = match records.next() {
        Some((_, header)) => {
            let header = header?;
            require_columns(&header, line_of(&header, 1), 2)?;
            header.iter().skip(1).map(|s| s.trim().to_owned()).collect()
        }
        None => {
            return Err(Error::BadParam(format!(
                "expression file {} is empty",
                path.display()
            )))
        }
    };
    let width = samples.len() + 1;
    let mut features: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for (i, r) in records {
        let record = r?;
        let line = line_of(&record, i + 1);
        if record.len() != width {
            return Err(MalformedError::NoColumnsFound {
                line,
                expected: width,
                found: record.len(),
            }
            .into());
        }
        features.push(record[0].trim().to_owned());
        for v in record.iter().skip(1) {
            values.push(parse_score(v, line)?);
        }
    }
    let matrix = Array2::from_shape_vec((features.len(), samples.len()), values)
        .map_err(|e| Error::BadParam(format!("expression matrix: {}", e)))?;
    debug!(
        "Read {} features x {} samples from {}",
        features.len(),
        samples.len(),
        path.display()
    );
    Dataset::new(stem(path, "dataset"), features, samples, matrix)
}

/// Reads sample labels separated by whitespace. With `continuous` every
/// label must be numeric and a continuous template is returned.
pub fn read_class_file(path: impl AsRef<Path>, continuous: bool) -> Result<Template> {
    let path = path.as_ref();
    let labels = split_labels(&fs::read_to_string(path)?);
    let name = stem(path, "template");
    if continuous {
        let values = labels
            .iter()
            .map(|l| parse_score(l, 1))
            .collect::<Result<Vec<f64>>>()?;
        Template::continuous(name, values)
    } else {
        Template::categorical(name, &labels)
    }
}
