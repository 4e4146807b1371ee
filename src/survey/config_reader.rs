use crate::survey::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    /// Where to write the JSON summary, relative to the configuration file.
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    /// `xlsx` or `csv`
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// The header of the column holding the respondent ids. A default id is
    /// generated from the file name and the line number otherwise.
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// Columns that are never considered, such as timestamps.
    #[serde(rename = "ignoreColumns")]
    pub ignore_columns: Option<Vec<String>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    /// The header of the column in the input file.
    pub column: String,
    pub id: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "scaleMin")]
    pub scale_min: Option<f64>,
    #[serde(rename = "scaleMax")]
    pub scale_max: Option<f64>,
    /// `higherIsBetter` or `higherIsWorse`. Mandatory.
    pub polarity: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecodeRule {
    pub contains: String,
    pub category: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TraitSpec {
    pub id: String,
    pub column: String,
    pub label: Option<String>,
    pub categories: Vec<String>,
    pub ordinal: Option<bool>,
    /// Substring rules, tried in order. The first match gives the category.
    pub recode: Option<Vec<RecodeRule>>,
    /// The category of the non-empty values that match no recode rule.
    pub otherwise: Option<String>,
    /// Only keep the integer at the start of the value: "3 (joined in 2022)" -> "3".
    #[serde(rename = "leadingInteger")]
    pub leading_integer: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSetting {
    /// `stddevCutoff` or `decile`
    pub policy: String,
    pub parameter: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EffectSizeSetting {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisSettings {
    #[serde(rename = "lowScoreThresholdPolicy")]
    pub low_score_threshold_policy: Option<ThresholdSetting>,
    #[serde(rename = "minValidResponses")]
    pub min_valid_responses: Option<usize>,
    #[serde(rename = "minCategoryCount")]
    pub min_category_count: Option<usize>,
    /// `parametric` or `rankBased`
    #[serde(rename = "groupTest")]
    pub group_test: Option<String>,
    #[serde(rename = "effectSizeSignificanceHint")]
    pub effect_size_significance_hint: Option<EffectSizeSetting>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub source: FileSource,
    /// The numeric value of each answer wording.
    #[serde(rename = "likertScale")]
    pub likert_scale: BTreeMap<String, f64>,
    pub items: Option<Vec<ItemSpec>>,
    /// If true, every other column answered with the Likert wording is an item.
    #[serde(rename = "detectItems")]
    pub detect_items: Option<bool>,
    /// The polarity of the detected items. Mandatory when detecting items.
    #[serde(rename = "detectedItemPolarity")]
    pub detected_item_polarity: Option<String>,
    pub traits: Vec<TraitSpec>,
    pub analysis: Option<AnalysisSettings>,
}

pub fn read_polarity(s: &str) -> SurveyResult<Polarity> {
    match s {
        "higherIsBetter" => Ok(Polarity::HigherIsBetter),
        "higherIsWorse" => Ok(Polarity::HigherIsWorse),
        x => whatever!(
            "unknown polarity {:?}: expected higherIsBetter or higherIsWorse",
            x
        ),
    }
}

impl SurveyConfig {
    /// The lowest and highest values of the Likert scale.
    pub fn likert_bounds(&self) -> SurveyResult<(f64, f64)> {
        let values: Vec<f64> = self.likert_scale.values().cloned().collect();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if values.is_empty() || lo >= hi {
            whatever!("the likert scale needs at least two distinct values")
        }
        Ok((lo, hi))
    }

    pub fn trait_defs(&self) -> Vec<TraitDef> {
        self.traits
            .iter()
            .map(|ts| TraitDef {
                id: ts.id.clone(),
                label: ts.label.clone().unwrap_or_else(|| ts.column.clone()),
                categories: ts.categories.clone(),
                ordinal: ts.ordinal.unwrap_or(false),
            })
            .collect()
    }

    pub fn analysis_config(&self) -> SurveyResult<AnalysisConfig> {
        let settings = self.analysis.clone().unwrap_or_default();
        let d = AnalysisConfig::DEFAULT;
        let low_score_threshold_policy = match settings.low_score_threshold_policy {
            None => d.low_score_threshold_policy,
            Some(t) => match t.policy.as_str() {
                "stddevCutoff" => ThresholdPolicy::StdDevCutoff(t.parameter),
                "decile" if t.parameter.fract() == 0.0 && t.parameter >= 0.0 => {
                    ThresholdPolicy::Decile(t.parameter as u32)
                }
                "decile" => whatever!("the decile must be an integer, got {}", t.parameter),
                x => whatever!("unknown low score threshold policy {:?}", x),
            },
        };
        let group_test = match settings.group_test.as_deref() {
            None | Some("parametric") => GroupTest::Parametric,
            Some("rankBased") => GroupTest::RankBased,
            Some(x) => whatever!("unknown group test {:?}", x),
        };
        let effect_size_hints = settings
            .effect_size_significance_hint
            .map(|h| EffectSizeHints {
                small: h.small,
                medium: h.medium,
                large: h.large,
            })
            .unwrap_or(d.effect_size_hints);
        let config = AnalysisConfig {
            low_score_threshold_policy,
            min_valid_responses: settings.min_valid_responses.unwrap_or(d.min_valid_responses),
            min_category_count: settings.min_category_count.unwrap_or(d.min_category_count),
            group_test,
            effect_size_hints,
        };
        config.validate().context(AnalysisSnafu {})?;
        Ok(config)
    }
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
