use crate::constants::DEFAULT_CONFIG_PATH;
use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "rouilleblobd",
    about = "An FTP server storing its files as PostgreSQL large objects."
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Overrides the control port from the configuration file
    #[arg(short = 'p', long)]
    pub listen_port: Option<u16>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["rouilleblobd"]);
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert_eq!(cli.listen_port, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["rouilleblobd", "-c", "/tmp/blob.conf", "-p", "2121", "-v"]);
        assert_eq!(cli.config, "/tmp/blob.conf");
        assert_eq!(cli.listen_port, Some(2121));
        assert!(cli.verbose);
    }
}
