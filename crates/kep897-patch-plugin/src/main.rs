use std::{
    io::{BufWriter, Read, Write},
    path::PathBuf,
};

use clap::Parser;
use kep897_patch::{
    PatchTransformer, TransformContext,
    loader::FileSystemLoader,
    merge::StrategicMerge,
    resource::ResourceCollection,
    transformer::{self, ConfigError},
    yaml,
};
use snafu::{ResultExt, Snafu};

const APP_NAME: &str = "kep897-patch-plugin";
const LOG_ENV: &str = "KEP897_PATCH_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitLogging { source: kep897_patch::logging::Error },

    #[snafu(display("failed to load transformer config"))]
    LoadConfig { source: ConfigError },

    #[snafu(display("failed to read resources from {input}"))]
    ReadResources {
        source: std::io::Error,
        input: String,
    },

    #[snafu(display("failed to parse resources from {input}"))]
    ParseResources {
        source: kep897_patch::loader::Error,
        input: String,
    },

    #[snafu(display("failed to transform resources"))]
    Transform { source: transformer::Error },

    #[snafu(display("failed to write transformed resources"))]
    WriteResources { source: yaml::Error },

    #[snafu(display("failed to flush output"))]
    FlushOutput { source: std::io::Error },
}

/// Applies strategic merge patches to every resource selected by a target.
///
/// Reads a multi-document YAML resource stream, and writes the transformed
/// stream to stdout.
#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about)]
struct Cli {
    /// Path to the Kep897Patch transformer config.
    config: PathBuf,

    /// File to read the resource stream from, stdin is used if not set.
    #[arg(long, env = "KEP897_PATCH_RESOURCES")]
    resources: Option<PathBuf>,

    /// Directory patch paths are resolved against.
    #[arg(long, env = "KEP897_PATCH_ROOT", default_value = ".")]
    root: PathBuf,
}

impl Cli {
    fn input_name(&self) -> String {
        match &self.resources {
            Some(path) => path.display().to_string(),
            None => "stdin".to_owned(),
        }
    }

    fn read_resources(&self) -> Result<ResourceCollection, Error> {
        let input = self.input_name();
        let content = match &self.resources {
            Some(path) => std::fs::read_to_string(path),
            None => {
                let mut content = String::new();
                std::io::stdin()
                    .read_to_string(&mut content)
                    .map(|_| content)
            }
        }
        .context(ReadResourcesSnafu {
            input: input.clone(),
        })?;

        ResourceCollection::from_yaml_str(&content).context(ParseResourcesSnafu { input })
    }

    fn run(&self, output: impl Write) -> Result<(), Error> {
        let transformer = PatchTransformer::from_yaml_file(&self.config).context(LoadConfigSnafu)?;
        let mut resources = self.read_resources()?;

        let loader = FileSystemLoader::new(&self.root);
        transformer
            .transform(&TransformContext::new(&loader, &StrategicMerge), &mut resources)
            .context(TransformSnafu)?;

        let mut output = BufWriter::new(output);
        yaml::serialize_resources(&resources, &mut output).context(WriteResourcesSnafu)?;
        output.flush().context(FlushOutputSnafu)
    }
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    kep897_patch::logging::initialize_logging(LOG_ENV, APP_NAME).context(InitLoggingSnafu)?;

    tracing::debug!(?cli, "starting transformer");
    cli.run(std::io::stdout().lock())
}
