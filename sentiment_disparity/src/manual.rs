/*!

This is the long-form manual for `sentiment_disparity` and `surveyscan`.

## Input formats

The answers are expected in a table: one row per respondent, one column per question,
and a header in the first row. Columns are always designated by their header.

The following formats are supported:
* `csv` Comma Separated Values
* `xlsx` Excel files, for example the exports of Microsoft Forms and Google Forms

### `csv`

```text
Timestamp,Respondent,Grade,Involvement,Teams,Belong
2024/03/01 8:02:11 AM,r01,9,"Yes, sports",Disagree,Strongly Agree
2024/03/01 8:05:43 AM,r02,9,No,Strongly Disagree,
```

Lines shorter than the header are padded with empty cells. Empty cells are missing answers.

### `xlsx`

The first row of the worksheet is the header. If the file has several worksheets, the name of
the worksheet must be given with `excelWorksheetName` (or `--excel-worksheet-name`).
Dates and formula errors are rejected.

## Configuration

```json
{
  "outputSettings": { "surveyName": "Spring census", "outputPath": "summary.json" },
  "source": {
    "provider": "csv",
    "filePath": "census.csv",
    "idColumn": "Respondent",
    "ignoreColumns": ["Timestamp"]
  },
  "likertScale": { "Strongly Agree": 6, "Agree": 5, "Somewhat Agree": 4,
                   "Somewhat Disagree": 3, "Disagree": 2, "Strongly Disagree": 1 },
  "items": [
    { "column": "Teams", "id": "teams", "polarity": "higherIsBetter" }
  ],
  "traits": [
    { "id": "involvement", "column": "Involvement", "categories": ["Participates", "Does not"],
      "recode": [{ "contains": "Yes", "category": "Participates" }], "otherwise": "Does not" }
  ],
  "analysis": { "lowScoreThresholdPolicy": { "policy": "stddevCutoff", "parameter": 1.0 } }
}
```

Relative paths are resolved against the directory of the configuration file.

`source`:
 - `provider` (`csv` or `xlsx`)
 - `filePath`
 - `idColumn` (optional): the column of the respondent ids. Otherwise, the id is made of
   the file name and the line number.
 - `excelWorksheetName` (optional)
 - `ignoreColumns` (optional): columns never considered as items.

`likertScale`: the numeric value of each answer wording. The lowest and highest values are
the scale of the items, unless an item states its own. Numeric cells are read as they are.
An item cell with a wording that is not in the scale is an error.

`items` (optional): the questions to analyse.
 - `column`, `id` (defaults to the column), `label` (defaults to the column)
 - `scaleMin`, `scaleMax` (optional)
 - `polarity` (mandatory): `higherIsBetter`, or `higherIsWorse` for reverse-coded
   questions such as "I feel stressed".

`detectItems` (optional): every column that is not the id, a trait or ignored, and that
contains at least one wording of the Likert scale, becomes an item. `detectedItemPolarity`
is then mandatory.

`traits`: the attributes of the respondents.
 - `id`, `column`, `label` (optional)
 - `categories`: the allowed values. Any other value is an error, empty cells are unknown.
 - `ordinal` (optional): the categories are ordered. A rank correlation with the answers is
   reported in addition to the group test.
 - `recode` (optional): substring rules tried in order, the first match gives the category.
 - `otherwise` (optional): the category of the values that match no rule.
 - `leadingInteger` (optional): only keep the number at the start of the value, so that
   `3 (joined in 2022)` is read as `3`.

`analysis` (optional, all fields optional):
 - `lowScoreThresholdPolicy`: `{"policy": "stddevCutoff", "parameter": k}` flags the items
   more than `k` standard deviations under the mean of the normalized scores (default 1).
   `{"policy": "decile", "parameter": d}` flags the items under the `d`-th decile.
 - `minValidResponses` (default 5): items with fewer answers are reported as insufficient.
 - `minCategoryCount` (default 3, at least 2): a comparison is inconclusive if a non-empty
   category has fewer answers.
 - `groupTest`: `parametric` (Welch t test for two categories, ANOVA beyond) or `rankBased`
   (Kruskal-Wallis).
 - `effectSizeSignificanceHint`: `{"small": 0.01, "medium": 0.06, "large": 0.14}`, the
   eta-squared cutoffs used for the `effectLabel` of the output.

## Output

The summary is a JSON object:
 - `config`: the survey name, the counts of respondents, items and traits, and the settings
 - `lowScores`: the flagged items, worst first
 - `itemRanking`: all the items with enough answers, worst first, with their normalized score
 - `insufficientData`: the items with too few answers
 - `disparities`: the conclusive comparisons, from the largest effect size to the smallest.
   Each has the test, the statistic, the degrees of freedom, the p value, the eta-squared,
   the mean and the count of every category, and the rank trend for ordinal traits.
 - `inconclusive`: the comparisons that could not be made, and why

Statistics that are infinite (perfect separation of the groups) are written as `null`.

 */
