use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Upload a local file to iRODS over concurrent parallel write streams.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Local file to upload
    pub local_file: PathBuf,

    /// Destination logical path, e.g. /tempZone/home/rods/data.bin
    pub logical_path: String,

    /// Number of concurrent write streams
    #[arg(short = 'n', long)]
    pub streams: Option<u32>,

    /// API root, e.g. http://localhost:9000/irods-http-api/0.5.0
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(short, long)]
    pub username: Option<String>,

    /// Maximum payload bytes per frame
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Configuration file (defaults to ~/.config/pwrite/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PWRITE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl Args {
    /// Overrides file values with whatever was given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(streams) = self.streams {
            config.stream_count = streams;
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(user) = &self.username {
            config.username = Some(user.clone());
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
    }
}
