use clap::Parser;

/// Finds the weak spots of a survey, and the groups of respondents that answer differently.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the survey: where the answers are, which columns are items and
    /// which are respondent traits. See the documentation of the `manual` module for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference file containing a previous summary in JSON format. If provided, surveyscan will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the answers are read from this file instead of the file
    /// named in the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or xlsx) The type of the input. Overrides the provider of the configuration.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. It may be omitted if the
    /// file has a single worksheet.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
