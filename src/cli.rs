use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Convert proxy share links between client formats", long_about = None)]
pub struct Args {
    #[arg(short, long, global = true, help = "Emit debug log")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode subscriptions and produce them in a client format
    Convert {
        #[arg(short, long, help = "Converter config, accept file path or URL")]
        config: Option<String>,

        #[arg(short, long = "input", help = "Subscription path, URL or - for stdin; overrides config sources")]
        inputs: Vec<String>,

        #[arg(short = 't', long = "target", help = "Output format, e.g. clashmeta, surge, sing-box")]
        format: Option<String>,

        #[arg(short, long, help = "Output path, stdout when absent")]
        output: Option<String>,
    },

    /// Check a proxies / proxy-groups / rules YAML document
    Validate {
        #[arg(help = "YAML config path")]
        path: String,

        #[arg(long, help = "Write the fixed config to this path")]
        fix_output: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert_args() {
        let args = Args::parse_from([
            "subforge", "convert", "-i", "a.txt", "-i", "-", "-t", "surge", "-o", "out.conf",
        ]);
        let Command::Convert { config, inputs, format, output } = args.command else {
            panic!("Expected convert command");
        };
        assert_eq!(config, None);
        assert_eq!(inputs, vec!["a.txt", "-"]);
        assert_eq!(format.as_deref(), Some("surge"));
        assert_eq!(output.as_deref(), Some("out.conf"));
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_validate_args() {
        let args = Args::parse_from(["subforge", "-v", "validate", "c.yaml", "--fix-output", "f.yaml"]);
        assert!(args.verbose);
        let Command::Validate { path, fix_output } = args.command else {
            panic!("Expected validate command");
        };
        assert_eq!(path, "c.yaml");
        assert_eq!(fix_output.as_deref(), Some("f.yaml"));
    }
}
