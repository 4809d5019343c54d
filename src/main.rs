use clap::Parser;
use log::{error, info};

use voc2grid::{process_dataset, Args};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_pipeline_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    info!(
        "Converting {} into {}x{} targets on a {}x{} grid...",
        config.annotations_dir.display(),
        config.encoding.image_size.width,
        config.encoding.image_size.height,
        config.encoding.grid.cells_x,
        config.encoding.grid.cells_y
    );

    if let Err(e) = process_dataset(&config) {
        error!("Failed to process dataset: {}", e);
        std::process::exit(1);
    }
}
