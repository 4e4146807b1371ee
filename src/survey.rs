use log::{debug, info, warn};

use sentiment_disparity::builder::MatrixBuilder;
use sentiment_disparity::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::survey::config_reader::*;
use crate::survey::io_common::*;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file has no worksheet or no header row"))]
    EmptyExcel {},
    #[snafu(display("Cannot find worksheet {name}"))]
    MissingWorksheet { name: String },
    #[snafu(display("Line {lineno}, column {column:?}: cannot read cell {content}"))]
    ExcelWrongCellType {
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Cannot find column {column:?} in the header of the input"))]
    MissingColumn { column: String },
    #[snafu(display("Line {lineno}, column {column:?}: unknown answer {content:?}"))]
    UnknownAnswer {
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Analysis failed"))]
    Analysis { source: AnalysisError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

// How each column of the input is used.
#[derive(PartialEq, Debug, Clone)]
struct ColumnPlan {
    id_col: Option<usize>,
    traits: Vec<(usize, TraitSpec)>,
    items: Vec<(usize, SentimentItem)>,
}

fn read_table(root_path: &Path, cfs: &FileSource, input_override: &Option<String>) -> SurveyResult<(String, ParsedTable)> {
    let p: PathBuf = match input_override {
        Some(x) => PathBuf::from(x),
        None => root_path.join(&cfs.file_path),
    };
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read survey file {:?}", p2);
    let table = match cfs.provider.as_str() {
        "xlsx" => io_xlsx::read_xlsx_table(&p2, cfs)?,
        "csv" => io_csv::read_csv_table(&p2)?,
        x => whatever!("provider not implemented: {:?}", x),
    };
    info!(
        "read_table: {} columns, {} rows",
        table.header.len(),
        table.rows.len()
    );
    Ok((p2, table))
}

fn is_likert_column(table: &ParsedTable, col: usize, config: &SurveyConfig) -> bool {
    table.rows.iter().any(|(_, cells)| match cells.get(col) {
        Some(RawValue::Text(s)) => config.likert_scale.contains_key(s.trim()),
        _ => false,
    })
}

fn plan_columns(table: &ParsedTable, config: &SurveyConfig) -> SurveyResult<ColumnPlan> {
    let id_col = match &config.source.id_column {
        Some(name) => Some(table.column(name)?),
        None => None,
    };

    let mut traits: Vec<(usize, TraitSpec)> = Vec::new();
    for ts in config.traits.iter() {
        traits.push((table.column(&ts.column)?, ts.clone()));
    }

    let (lo, hi) = config.likert_bounds()?;
    let mut items: Vec<(usize, SentimentItem)> = Vec::new();
    for spec in config.items.clone().unwrap_or_default() {
        let col = table.column(&spec.column)?;
        items.push((
            col,
            SentimentItem {
                id: spec.id.clone().unwrap_or_else(|| spec.column.clone()),
                label: spec.label.clone().unwrap_or_else(|| spec.column.clone()),
                scale_min: spec.scale_min.unwrap_or(lo),
                scale_max: spec.scale_max.unwrap_or(hi),
                polarity: read_polarity(&spec.polarity)?,
            },
        ));
    }

    if config.detect_items.unwrap_or(false) {
        let polarity = match &config.detected_item_polarity {
            Some(p) => read_polarity(p)?,
            None => whatever!("detectedItemPolarity is required when detectItems is set"),
        };
        let mut used: HashSet<usize> = traits.iter().map(|(c, _)| *c).collect();
        used.extend(items.iter().map(|(c, _)| *c));
        used.extend(id_col);
        for name in config.source.ignore_columns.clone().unwrap_or_default() {
            used.insert(table.column(&name)?);
        }
        for (col, name) in table.header.iter().enumerate() {
            if used.contains(&col) || name.is_empty() || !is_likert_column(table, col, config) {
                continue;
            }
            debug!("plan_columns: detected item column {:?}", name);
            items.push((
                col,
                SentimentItem::new(name, name, (lo, hi), polarity),
            ));
        }
    }

    info!(
        "plan_columns: {} traits, {} items",
        traits.len(),
        items.len()
    );
    Ok(ColumnPlan {
        id_col,
        traits,
        items,
    })
}

fn read_trait_cell(cell: &RawValue, spec: &TraitSpec, lineno: usize) -> RawValue {
    let text = match cell_text(cell) {
        Some(t) => t,
        None => return RawValue::Missing,
    };
    if spec.leading_integer.unwrap_or(false) {
        return match leading_integer(&text) {
            Some(i) => RawValue::Integer(i),
            None => {
                warn!(
                    "line {}: trait {}: no leading integer in {:?}, treated as unknown",
                    lineno, spec.id, text
                );
                RawValue::Missing
            }
        };
    }
    if let Some(rules) = &spec.recode {
        if let Some(rule) = rules.iter().find(|r| text.contains(&r.contains)) {
            return RawValue::Text(rule.category.clone());
        }
    }
    match &spec.otherwise {
        Some(c) => RawValue::Text(c.clone()),
        None => RawValue::Text(text),
    }
}

fn read_item_cell(
    cell: &RawValue,
    column: &str,
    lineno: usize,
    config: &SurveyConfig,
) -> SurveyResult<RawValue> {
    match cell {
        RawValue::Text(s) => {
            let v = config
                .likert_scale
                .get(s.trim())
                .cloned()
                .context(UnknownAnswerSnafu {
                    lineno,
                    column,
                    content: s.clone(),
                })?;
            Ok(RawValue::Float(v))
        }
        x => Ok(x.clone()),
    }
}

fn build_rows(table: &ParsedTable, plan: &ColumnPlan, config: &SurveyConfig, path: &str) -> SurveyResult<Vec<RawRow>> {
    let default_id = make_default_id(path);
    let mut rows: Vec<RawRow> = Vec::new();
    for (lineno, cells) in table.rows.iter() {
        let id = plan
            .id_col
            .and_then(|c| cell_text(&cells[c]))
            .unwrap_or_else(|| default_id(*lineno));
        let mut traits: BTreeMap<String, RawValue> = BTreeMap::new();
        for (col, spec) in plan.traits.iter() {
            traits.insert(spec.id.clone(), read_trait_cell(&cells[*col], spec, *lineno));
        }
        let mut responses: BTreeMap<String, RawValue> = BTreeMap::new();
        for (col, item) in plan.items.iter() {
            let v = read_item_cell(&cells[*col], &table.header[*col], *lineno, config)?;
            responses.insert(item.id.clone(), v);
        }
        debug!("build_rows: line {} id {:?}", lineno, id);
        rows.push(RawRow {
            id,
            traits,
            responses,
        });
    }
    Ok(rows)
}

/// Reads the survey described by the configuration and validates it into a matrix.
pub fn load_matrix(
    config: &SurveyConfig,
    root_path: &Path,
    input_override: &Option<String>,
) -> SurveyResult<ResponseMatrix> {
    let (path, table) = read_table(root_path, &config.source, input_override)?;
    let plan = plan_columns(&table, config)?;
    let rows = build_rows(&table, &plan, config, &path)?;
    let items: Vec<SentimentItem> = plan.items.iter().map(|(_, i)| i.clone()).collect();
    let mut builder = MatrixBuilder::new(&items, &config.trait_defs()).context(AnalysisSnafu {})?;
    for row in rows.iter() {
        builder.add_row(row).context(AnalysisSnafu {})?;
    }
    Ok(builder.build())
}

fn finding_to_json(f: &LowScoreFinding) -> JSValue {
    json!({
        "itemId": f.item_id,
        "label": f.label,
        "mean": f.mean,
        "normalizedScore": f.normalized_score,
        "validCount": f.valid_count,
    })
}

fn policy_to_json(policy: &ThresholdPolicy) -> JSValue {
    match policy {
        ThresholdPolicy::StdDevCutoff(k) => json!({"policy": "stddevCutoff", "parameter": k}),
        ThresholdPolicy::Decile(d) => json!({"policy": "decile", "parameter": d}),
    }
}

fn disparity_to_json(r: &DisparityResult, hints: &EffectSizeHints) -> JSValue {
    let mut means: JSMap<String, JSValue> = JSMap::new();
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    for cm in r.category_means.iter() {
        means.insert(cm.category.clone(), json!(cm.mean));
        counts.insert(cm.category.clone(), json!(cm.count));
    }
    let trend = match &r.trend {
        Some(t) => json!({"rho": t.rho, "pValue": t.p_value}),
        None => JSValue::Null,
    };
    json!({
        "trait": r.trait_id,
        "itemId": r.item_id,
        "test": r.test.name(),
        "statistic": r.statistic,
        "degreesOfFreedom": [r.degrees_of_freedom.0, r.degrees_of_freedom.1],
        "pValue": r.p_value,
        "effectSize": r.effect_size,
        "effectLabel": hints.magnitude(r.effect_size).name(),
        "sampleSize": r.sample_size,
        "categoryMeans": means,
        "categoryCounts": counts,
        "trend": trend,
    })
}

fn inconclusive_to_json(r: &InconclusiveResult) -> JSValue {
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    for (c, n) in r.category_counts.iter() {
        counts.insert(c.clone(), json!(n));
    }
    json!({
        "trait": r.trait_id,
        "itemId": r.item_id,
        "reason": r.reason.describe(),
        "categoryCounts": counts,
    })
}

pub fn build_summary_js(
    config: &SurveyConfig,
    analysis: &AnalysisConfig,
    matrix: &ResponseMatrix,
    report: &AnalysisReport,
) -> JSValue {
    let c = json!({
        "survey": config.output_settings.survey_name,
        "respondents": matrix.num_respondents(),
        "items": matrix.items().len(),
        "traits": matrix.traits().len(),
        "lowScoreThresholdPolicy": policy_to_json(&report.low_scores.policy),
        "minValidResponses": analysis.min_valid_responses,
        "minCategoryCount": analysis.min_category_count,
    });
    let insufficient: Vec<JSValue> = report
        .insufficient
        .iter()
        .map(|i| {
            json!({
                "itemId": i.item_id,
                "label": i.label,
                "validCount": i.valid_count,
                "required": i.required,
            })
        })
        .collect();
    json!({
        "config": c,
        "lowScores": report.low_scores.flagged.iter().map(finding_to_json).collect::<Vec<JSValue>>(),
        "itemRanking": report.low_scores.ranked_items.iter().map(finding_to_json).collect::<Vec<JSValue>>(),
        "insufficientData": insufficient,
        "disparities": report
            .disparities
            .ranked
            .iter()
            .map(|r| disparity_to_json(r, &analysis.effect_size_hints))
            .collect::<Vec<JSValue>>(),
        "inconclusive": report
            .disparities
            .inconclusive
            .iter()
            .map(inconclusive_to_json)
            .collect::<Vec<JSValue>>(),
    })
}

fn write_summary(pretty_js: &str, out_path: &Option<String>) -> SurveyResult<()> {
    match out_path.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty_js);
            Ok(())
        }
        Some(p) => {
            info!("Writing summary to {:?}", p);
            fs::write(p, pretty_js).context(WritingOutputSnafu { path: p })
        }
    }
}

/// Command line overrides of the configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RunOptions {
    pub input: Option<String>,
    pub input_type: Option<String>,
    pub excel_worksheet_name: Option<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
}

/// Runs the whole analysis described by a configuration file, and returns the summary.
pub fn run_survey(config_path: &str, options: &RunOptions) -> SurveyResult<JSValue> {
    let config_p = Path::new(config_path);
    let mut config: SurveyConfig = read_config(config_path)?;
    info!("config: {:?}", config);
    if let Some(provider) = &options.input_type {
        config.source.provider = provider.clone();
    }
    if let Some(ws) = &options.excel_worksheet_name {
        config.source.excel_worksheet_name = Some(ws.clone());
    }
    let analysis = config.analysis_config()?;

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
    let matrix = load_matrix(&config, root_p, &options.input)?;

    let report = run_analysis(&matrix, &analysis).context(AnalysisSnafu {})?;

    let result_js = build_summary_js(&config, &analysis, &matrix, &report);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path: Option<String> = match &options.out {
        Some(x) => Some(x.clone()),
        None => config
            .output_settings
            .output_path
            .clone()
            .map(|p| root_p.join(p).display().to_string()),
    };
    write_summary(&pretty_js_stats, &out_path)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &options.reference {
        let summary_ref = read_summary(summary_p)?;
        if summary_ref != result_js {
            let pretty_js_summary_ref =
                serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(result_js)
}
