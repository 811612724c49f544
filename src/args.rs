use clap::Parser;

/// Ranks and caps the species recorded on vegetation survey forms.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the survey: record sources, reference tables,
    /// forms and categories. See the manual of the species_ranking crate for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path, optional) The file containing the records. Setting this option overrides
    /// the path of the first record source of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the JSON summary. It is printed on the
    /// standard output by default.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, a flat CSV report with one row per record is written
    /// to this location. A bare file name is placed in the output directory of the configuration.
    #[clap(long, value_parser)]
    pub csv_out: Option<String>,

    /// (file path) A reference JSON summary. If provided, vegrank checks that the computed
    /// summary matches it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
