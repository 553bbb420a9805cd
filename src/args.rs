use clap::Parser;

/// This is a cross-tabulation program for survey responses.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the report: input, derived fields, cross-variables,
    /// questions and rules. See the manual of the crosstab crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A summary from a previous run, in JSON format. If provided, xtab fails
    /// when the new summary differs from it, and prints the differences.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) Where the JSON summary of the report is written.
    /// Takes precedence over outputSettings.outputPath of the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the survey responses are read from this file.
    /// Setting this option overrides the input file of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (xlsx or csv) The type of the input. By default, it is guessed from the file extension.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. The first worksheet is used otherwise.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (repeatable) Only tabulate the given question columns.
    #[clap(short, long, value_parser)]
    pub question: Option<Vec<String>>,

    /// (repeatable) Only tabulate against the given cross-variables.
    #[clap(long, value_parser)]
    pub variable: Option<Vec<String>>,

    // Other arguments
    /// Turns on debug logging.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
