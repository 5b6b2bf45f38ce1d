//! Command line options

use clap::Parser;
use std::path::PathBuf;

/// Serve static files over HTTP with range and conditional request support
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Opt {
    /// Directory to serve files from (overrides `files.root`)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Configuration file, without extension
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let opt = Opt::parse_from(["filesend", "-r", "/srv/www", "--port", "9000", "-v"]);
        assert_eq!(opt.root, Some(PathBuf::from("/srv/www")));
        assert_eq!(opt.port, Some(9000));
        assert_eq!(opt.config, None);
        assert!(opt.verbose);
    }

    #[test]
    fn test_defaults() {
        let opt = Opt::parse_from(["filesend"]);
        assert!(opt.root.is_none());
        assert!(opt.port.is_none());
        assert!(!opt.verbose);
    }
}
